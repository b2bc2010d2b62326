//! Key-based request routing
//!
//! A key is mapped onto the groups currently tracked as active. The mapping
//! moves keys whenever the active set changes; callers that need stable
//! placement must keep the active set stable.

use bytes::Bytes;
use proven_raft_host::{GroupId, NodeHost, RequestResult, StateMachineResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, ErrorKind, ShardResult};
use crate::host::HostAdapter;
use crate::tracker::LeadershipTracker;

/// Pick the group for `key` out of an ascending list of active groups
pub fn select_group(key: u64, active_groups: &[GroupId]) -> Option<GroupId> {
    if active_groups.is_empty() {
        return None;
    }

    let index = key % active_groups.len() as u64;
    active_groups.get(index as usize).copied()
}

/// Routes proposals to groups by key
#[derive(Debug, Clone)]
pub struct RequestRouter {
    tracker: Arc<LeadershipTracker>,
}

impl RequestRouter {
    /// Create a router over the given tracker
    pub fn new(tracker: Arc<LeadershipTracker>) -> Self {
        Self { tracker }
    }

    /// Group currently responsible for `key`
    pub fn route(&self, key: u64) -> ShardResult<GroupId> {
        select_group(key, &self.tracker.active_groups()).ok_or_else(|| {
            Error::with_context(
                ErrorKind::NoActiveGroups,
                format!("no active group for key {key}"),
            )
        })
    }

    /// Propose `data` to the group owning `key` and wait for it to be applied
    pub async fn propose<H: NodeHost>(
        &self,
        host: &HostAdapter<H>,
        key: u64,
        data: Bytes,
        timeout: Duration,
    ) -> ShardResult<StateMachineResult> {
        let group_id = self.route(key)?;
        debug!("Routing key {} to {}", key, group_id);

        let state = host.propose(group_id, data, timeout)?;

        let result = tokio::time::timeout(timeout, state.result())
            .await
            .map_err(|_| Error::timeout(format!("proposal to {group_id} timed out")))?;

        match result {
            RequestResult::Completed(result) => Ok(result),
            RequestResult::Timeout => Err(Error::timeout(format!(
                "proposal to {group_id} timed out"
            ))),
            RequestResult::Rejected => Err(Error::with_context(
                ErrorKind::Rejected,
                format!("proposal to {group_id} rejected"),
            )),
            other => Err(Error::with_context(
                ErrorKind::Proposal,
                format!("proposal to {group_id} not applied: {other:?}"),
            )),
        }
    }
}
