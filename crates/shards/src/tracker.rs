//! Leadership tracking
//!
//! Records the latest leader reported by the engine for every group this node
//! hosts. Events arrive on engine threads while readers (the router and
//! operators) take snapshots concurrently, so the map lives behind a single
//! lock and readers only ever see owned copies.

use parking_lot::RwLock;
use proven_raft_host::{GroupId, LeaderInfo, RaftEventListener, ReplicaId};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::error::{Error, ErrorKind, ShardResult};

/// Group ID to the last reported leader, `ReplicaId::NONE` until one is reported
pub type ClusterMap = BTreeMap<GroupId, ReplicaId>;

/// Tracks which replica leads each hosted group
pub struct LeadershipTracker {
    node_id: ReplicaId,
    groups: RwLock<ClusterMap>,
    /// Bumped on every leader event
    version: watch::Sender<u64>,
}

impl LeadershipTracker {
    /// Create an empty tracker for the given local replica
    pub fn new(node_id: ReplicaId) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            node_id,
            groups: RwLock::new(ClusterMap::new()),
            version,
        }
    }

    /// Local replica ID
    pub fn node_id(&self) -> ReplicaId {
        self.node_id
    }

    /// Register a started group with no known leader
    ///
    /// A leader reported before registration is kept. Returns `true` if the
    /// group was not tracked yet.
    pub fn register_group(&self, group_id: GroupId) -> bool {
        let mut groups = self.groups.write();
        if groups.contains_key(&group_id) {
            return false;
        }
        groups.insert(group_id, ReplicaId::NONE);
        true
    }

    /// Tracked groups, in ascending order
    ///
    /// Includes groups registered by a bind whose first leader event has not
    /// arrived yet; a group leaves the set when its leader is reported lost.
    pub fn active_groups(&self) -> Vec<GroupId> {
        self.groups.read().keys().copied().collect()
    }

    /// Copy of every tracked group and its last reported leader
    pub fn cluster_map(&self) -> ClusterMap {
        self.groups.read().clone()
    }

    /// Current leader of a group, if one is known
    pub fn leader_of(&self, group_id: GroupId) -> Option<ReplicaId> {
        self.groups
            .read()
            .get(&group_id)
            .copied()
            .filter(|leader| !leader.is_none())
    }

    /// Run `f` against the map while holding the read lock
    ///
    /// Leader events block until `f` returns, so keep it short.
    pub fn inspect<R>(&self, f: impl FnOnce(&ClusterMap) -> R) -> R {
        f(&self.groups.read())
    }

    /// Wait until a leader is known for `group_id`
    pub async fn wait_for_leader(
        &self,
        group_id: GroupId,
        timeout: Duration,
    ) -> ShardResult<ReplicaId> {
        let mut changes = self.version.subscribe();

        let wait = async {
            loop {
                if let Some(leader) = self.leader_of(group_id) {
                    return Ok::<_, Error>(leader);
                }

                changes.changed().await.map_err(|_| {
                    Error::with_context(ErrorKind::Closed, "leadership tracker dropped")
                })?;
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            Error::timeout(format!("no leader for {group_id} after {timeout:?}"))
        })?
    }

    /// Forget every tracked group
    pub fn clear(&self) {
        self.groups.write().clear();
        self.version.send_modify(|version| *version += 1);
    }

    fn record(&self, info: &LeaderInfo) {
        {
            let mut groups = self.groups.write();
            if info.leader_id.is_none() {
                groups.remove(&info.group_id);
            } else {
                groups.insert(info.group_id, info.leader_id);
            }
        }
        self.version.send_modify(|version| *version += 1);
    }
}

impl RaftEventListener for LeadershipTracker {
    fn leader_updated(&self, info: LeaderInfo) {
        self.record(&info);

        if info.leader_id.is_none() {
            info!("Leader lost for {} (term {})", info.group_id, info.term);
        } else {
            info!(
                "Leader updated for {}: {} (term {}, local: {})",
                info.group_id,
                info.leader_id,
                info.term,
                info.leader_id == self.node_id
            );
        }
    }
}

impl Debug for LeadershipTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeadershipTracker")
            .field("node_id", &self.node_id)
            .field("groups", &*self.groups.read())
            .finish()
    }
}
