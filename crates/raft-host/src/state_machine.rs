//! Replicated state machine contract

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::{GroupId, ReplicaId};

/// Errors raised by a state machine
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateMachineError {
    /// Query could not be understood
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Snapshot could not be produced
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// A committed log entry handed to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Log index of the entry within its group
    pub index: u64,

    /// Proposed payload
    pub cmd: Bytes,
}

/// Result of applying an entry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateMachineResult {
    /// Application defined value
    pub value: u64,

    /// Optional payload attached by the state machine
    pub data: Bytes,
}

/// State machine applying committed entries
///
/// One instance may be shared by several groups, so every method takes `&self`
/// and receives the group the call belongs to.
pub trait StateMachine: Send + Sync + 'static {
    /// Apply a committed entry
    fn update(&self, group_id: GroupId, entry: Entry) -> StateMachineResult;

    /// Read-only query against the current state
    fn lookup(&self, group_id: GroupId, query: &[u8]) -> Result<Bytes, StateMachineError>;

    /// Serialize the state belonging to `group_id`
    fn save_snapshot(&self, group_id: GroupId) -> Result<Bytes, StateMachineError>;
}

/// Creates the state machine for a (group, replica) pair
pub type StateMachineFactory =
    Arc<dyn Fn(GroupId, ReplicaId) -> Arc<dyn StateMachine> + Send + Sync>;

/// Factory returning the same instance for every group and replica
pub fn shared_factory(state_machine: Arc<dyn StateMachine>) -> StateMachineFactory {
    Arc::new(move |_, _| Arc::clone(&state_machine))
}
