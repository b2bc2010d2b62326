//! Thin adapter over the node host
//!
//! Every engine call made by the shard layer goes through here, so deadlines are
//! enforced in one place and engine errors come back as [`Error`]s.

use bytes::Bytes;
use proven_raft_host::{
    GroupConfig, GroupId, Membership, NodeHost, ReplicaId, RequestState, StateMachineFactory,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, ErrorKind, ShardResult};

/// Wraps a [`NodeHost`] with deadline handling and error mapping
#[derive(Debug)]
pub struct HostAdapter<H> {
    host: H,
}

impl<H: NodeHost> HostAdapter<H> {
    pub(crate) fn new(host: H) -> Self {
        Self { host }
    }

    /// Underlying node host
    pub fn inner(&self) -> &H {
        &self.host
    }

    /// Start (or join) one group
    pub async fn start_group(
        &self,
        initial_members: BTreeMap<ReplicaId, String>,
        join: bool,
        factory: StateMachineFactory,
        config: GroupConfig,
    ) -> ShardResult<()> {
        let group_id = config.group_id;
        self.host
            .start_group(initial_members, join, factory, config)
            .await
            .map_err(|e| {
                Error::from_host(
                    ErrorKind::Bootstrap,
                    format!("failed to start {group_id}"),
                    e,
                )
            })
    }

    /// Read the membership of a group before `deadline`
    pub async fn membership(
        &self,
        group_id: GroupId,
        deadline: Instant,
    ) -> ShardResult<Membership> {
        ensure_before(deadline, || format!("membership query for {group_id}"))?;

        tokio::time::timeout_at(deadline, self.host.get_membership(group_id, deadline))
            .await
            .map_err(|_| Error::timeout(format!("membership query for {group_id} timed out")))?
            .map_err(|e| {
                Error::from_host(
                    ErrorKind::Membership,
                    format!("failed to read membership of {group_id}"),
                    e,
                )
            })
    }

    /// Add a replica to a group before `deadline`
    ///
    /// `config_change_id` must come from the latest membership of the group.
    pub async fn add_node(
        &self,
        group_id: GroupId,
        replica_id: ReplicaId,
        address: &str,
        config_change_id: u64,
        deadline: Instant,
    ) -> ShardResult<()> {
        ensure_before(deadline, || format!("adding {replica_id} to {group_id}"))?;

        tokio::time::timeout_at(
            deadline,
            self.host.request_add_node(
                group_id,
                replica_id,
                address.to_string(),
                config_change_id,
                deadline,
            ),
        )
        .await
        .map_err(|_| Error::timeout(format!("adding {replica_id} to {group_id} timed out")))?
        .map_err(|e| {
            Error::from_host(
                ErrorKind::Membership,
                format!("failed to add {replica_id} to {group_id}"),
                e,
            )
        })
    }

    /// Ask the engine to move leadership of a group to `target`
    ///
    /// Returns once the request is accepted, not once leadership has moved.
    pub fn transfer_leader(&self, group_id: GroupId, target: ReplicaId) -> ShardResult<()> {
        self.host
            .request_leader_transfer(group_id, target)
            .map_err(|e| {
                Error::from_host(
                    ErrorKind::LeaderTransfer,
                    format!("failed to transfer {group_id} to {target}"),
                    e,
                )
            })
    }

    /// Submit a command to a group through a no-op session
    pub fn propose(
        &self,
        group_id: GroupId,
        data: Bytes,
        timeout: Duration,
    ) -> ShardResult<RequestState> {
        let session = self.host.noop_session(group_id);
        self.host.propose(&session, data, timeout).map_err(|e| {
            Error::from_host(
                ErrorKind::Proposal,
                format!("failed to propose to {group_id}"),
                e,
            )
        })
    }

    /// Stop the node host
    pub async fn stop(&self) {
        self.host.stop().await;
    }
}

fn ensure_before(deadline: Instant, operation: impl FnOnce() -> String) -> ShardResult<()> {
    if Instant::now() >= deadline {
        return Err(Error::timeout(format!(
            "deadline elapsed before {}",
            operation()
        )));
    }
    Ok(())
}
