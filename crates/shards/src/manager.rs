//! Group lifecycle management
//!
//! The [`ShardManager`] owns the node host for the lifetime of the process. It
//! starts groups, changes their membership and leadership, and hands proposals
//! to the router.

use bytes::Bytes;
use proven_raft_host::{
    GroupId, HostAdaptor, Membership, RaftEventListener, ReplicaId, StateMachine,
    StateMachineFactory, StateMachineResult, shared_factory,
};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::ShardManagerConfig;
use crate::error::{Error, ErrorKind, ShardResult};
use crate::host::HostAdapter;
use crate::peers::parse_peer_list;
use crate::router::RequestRouter;
use crate::tracker::{ClusterMap, LeadershipTracker};

/// Coordinates every consensus group hosted by this node
pub struct ShardManager<A: HostAdaptor> {
    config: ShardManagerConfig,
    host: HostAdapter<A::Host>,
    tracker: Arc<LeadershipTracker>,
    router: RequestRouter,
    factory: StateMachineFactory,
    /// Serialises bind, membership changes and shutdown
    lifecycle: Mutex<()>,
}

impl<A: HostAdaptor> ShardManager<A> {
    /// Create the node host and wire the leadership tracker as its event sink
    ///
    /// Every group started later shares `state_machine`.
    pub async fn init(
        config: ShardManagerConfig,
        adaptor: &A,
        state_machine: Arc<dyn StateMachine>,
    ) -> ShardResult<Self> {
        config.validate()?;

        let tracker = Arc::new(LeadershipTracker::new(config.node_id));
        let host_config = config.host_config();

        info!(
            "Initializing node host for {} at {} (dir: {:?})",
            config.node_id, config.bind_address, host_config.node_host_dir
        );

        let listener: Arc<dyn RaftEventListener> = tracker.clone();
        let host = adaptor
            .create_host(host_config, listener)
            .await
            .map_err(|e| {
                error!("Failed to create node host: {}", e);
                Error::from_host(
                    ErrorKind::Bootstrap,
                    format!("failed to create node host at {}", config.bind_address),
                    e,
                )
            })?;

        Ok(Self {
            config,
            host: HostAdapter::new(host),
            router: RequestRouter::new(Arc::clone(&tracker)),
            tracker,
            factory: shared_factory(state_machine),
            lifecycle: Mutex::new(()),
        })
    }

    /// Local replica ID
    pub fn node_id(&self) -> ReplicaId {
        self.config.node_id
    }

    /// Manager configuration
    pub fn config(&self) -> &ShardManagerConfig {
        &self.config
    }

    /// Leadership tracker fed by the node host
    pub fn tracker(&self) -> &Arc<LeadershipTracker> {
        &self.tracker
    }

    /// Underlying node host
    pub fn host(&self) -> &A::Host {
        self.host.inner()
    }

    /// Start the given groups
    ///
    /// `initial_members` is an `id@address` list. Unless joining, this node is
    /// added to it. Groups are started in order and the first failure aborts the
    /// rest; groups already started keep running.
    pub async fn bind_cluster(
        &self,
        initial_members: &str,
        join: bool,
        group_ids: &[GroupId],
    ) -> ShardResult<()> {
        let mut members = parse_peer_list(initial_members);
        if !join {
            members.insert(self.config.node_id, self.config.bind_address.clone());
        }

        let _guard = self.lifecycle.lock().await;

        for &group_id in group_ids {
            let group_config = self.config.group_config(group_id);

            self.host
                .start_group(
                    members.clone(),
                    join,
                    Arc::clone(&self.factory),
                    group_config,
                )
                .await
                .inspect_err(|e| error!("Failed to start {}: {}", group_id, e))?;

            self.tracker.register_group(group_id);
            info!(
                "Started {} with {} initial members (join: {})",
                group_id,
                members.len(),
                join
            );
        }

        Ok(())
    }

    /// Add a peer to the given groups within the configured membership timeout
    pub async fn add_node(
        &self,
        peer_id: ReplicaId,
        address: &str,
        group_ids: &[GroupId],
    ) -> ShardResult<()> {
        let deadline = Instant::now() + self.config.membership_timeout;
        self.add_node_with_deadline(peer_id, address, deadline, group_ids)
            .await
    }

    /// Add a peer to the given groups, all before `deadline`
    ///
    /// Stops at the first failure; groups already changed keep the new member.
    pub async fn add_node_with_deadline(
        &self,
        peer_id: ReplicaId,
        address: &str,
        deadline: Instant,
        group_ids: &[GroupId],
    ) -> ShardResult<()> {
        let _guard = tokio::time::timeout_at(deadline, self.lifecycle.lock())
            .await
            .map_err(|_| Error::timeout(format!("adding {peer_id} timed out")))?;

        for &group_id in group_ids {
            let membership = self.host.membership(group_id, deadline).await?;
            debug!(
                "Adding {} to {} at config change {}",
                peer_id, group_id, membership.config_change_id
            );

            self.host
                .add_node(
                    group_id,
                    peer_id,
                    address,
                    membership.config_change_id,
                    deadline,
                )
                .await
                .inspect_err(|e| error!("Failed to add {} to {}: {}", peer_id, group_id, e))?;

            info!("Added {} ({}) to {}", peer_id, address, group_id);
        }

        Ok(())
    }

    /// Request leadership of the given groups to move to `target`
    ///
    /// Returns once every request is accepted; the moves show up later as
    /// leader events. The first failure leaves the remaining groups untouched.
    pub fn transfer_clusters(&self, target: ReplicaId, group_ids: &[GroupId]) -> ShardResult<()> {
        for &group_id in group_ids {
            self.host.transfer_leader(group_id, target)?;
            info!("Requested leadership transfer of {} to {}", group_id, target);
        }

        Ok(())
    }

    /// Groups currently tracked as active, in ascending order
    pub fn get_active_clusters(&self) -> Vec<GroupId> {
        self.tracker.active_groups()
    }

    /// Copy of the group to leader map
    pub fn get_cluster_map(&self) -> ClusterMap {
        self.tracker.cluster_map()
    }

    /// Membership of one group, within the configured membership timeout
    pub async fn get_membership(&self, group_id: GroupId) -> ShardResult<Membership> {
        let deadline = Instant::now() + self.config.membership_timeout;
        self.host.membership(group_id, deadline).await
    }

    /// Propose `data` to the group owning `key`
    ///
    /// Waits at most `timeout` for the entry to be applied.
    pub async fn propose(
        &self,
        key: u64,
        data: impl Into<Bytes>,
        timeout: Duration,
    ) -> ShardResult<StateMachineResult> {
        self.router
            .propose(&self.host, key, data.into(), timeout)
            .await
    }

    /// Stop the node host and every group on it
    ///
    /// The tracker is cleared, so no group is reported active afterwards.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.host.stop().await;
        self.tracker.clear();
        info!("Shard manager for {} shut down", self.config.node_id);
    }
}

impl<A: HostAdaptor> Debug for ShardManager<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardManager")
            .field("node_id", &self.config.node_id)
            .field("bind_address", &self.config.bind_address)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
