//! Proposal sessions, results and membership snapshots

use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::oneshot;

use crate::{GroupId, ReplicaId, StateMachineResult};

/// Client session used to submit proposals
///
/// Only no-op sessions exist: they carry no series id, so retried proposals are
/// not deduplicated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    group_id: GroupId,
}

impl Session {
    /// Create a no-op session bound to a group
    pub fn noop(group_id: GroupId) -> Self {
        Self { group_id }
    }

    /// Group this session submits to
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }
}

/// Outcome of a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestResult {
    /// Entry committed and applied
    Completed(StateMachineResult),

    /// Engine gave up waiting for the entry to commit
    Timeout,

    /// Engine refused the request
    Rejected,

    /// Group or host was shut down while the request was in flight
    Terminated,

    /// Request was aborted before being proposed
    Aborted,

    /// Request was dropped, usually because the group has no leader
    Dropped,
}

impl RequestResult {
    /// Whether the entry was applied
    pub fn is_completed(&self) -> bool {
        matches!(self, RequestResult::Completed(_))
    }
}

/// Pending proposal; resolves exactly once
#[derive(Debug)]
pub struct RequestState {
    result_rx: oneshot::Receiver<RequestResult>,
}

impl RequestState {
    /// Create a pending request and the sender used to complete it
    pub fn new() -> (oneshot::Sender<RequestResult>, Self) {
        let (result_tx, result_rx) = oneshot::channel();
        (result_tx, Self { result_rx })
    }

    /// Wait for the outcome
    ///
    /// If the engine drops the request without answering, it is reported as
    /// `Terminated`.
    pub async fn result(self) -> RequestResult {
        self.result_rx.await.unwrap_or(RequestResult::Terminated)
    }
}

/// Membership of a group as seen by the local host
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Change token; must be echoed by the next membership change
    pub config_change_id: u64,

    /// Voting members and their raft addresses
    pub nodes: BTreeMap<ReplicaId, String>,

    /// Replicas removed from the group; they may never rejoin
    pub removed: BTreeSet<ReplicaId>,
}
