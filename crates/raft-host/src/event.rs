//! Raft event notifications

use crate::{GroupId, ReplicaId};

/// Leadership information for one group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderInfo {
    /// Group whose leadership changed
    pub group_id: GroupId,

    /// Local replica reporting the change
    pub replica_id: ReplicaId,

    /// Raft term of the change
    pub term: u64,

    /// New leader; `ReplicaId::NONE` when leadership was lost
    pub leader_id: ReplicaId,
}

/// Receives raft events emitted by a node host
///
/// Hosts call this from their own tasks, possibly concurrently for different
/// groups. Implementations must not block.
pub trait RaftEventListener: Send + Sync + 'static {
    /// Leadership of a group changed
    fn leader_updated(&self, info: LeaderInfo);
}
