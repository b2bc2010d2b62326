//! Error types for the in-memory node host.

use std::path::PathBuf;

use proven_raft_host::{
    ConfigError, GroupId, HostAdaptorError, HostErrorKind, ReplicaId, StateMachineError,
};
use thiserror::Error;

/// Error type for the in-memory node host.
#[derive(Debug, Error)]
pub enum Error {
    /// Another host in this process already bound the raft address.
    #[error("Raft address already in use: {0}")]
    AddressInUse(String),

    /// The raft address is empty.
    #[error("Invalid raft address: {0:?}")]
    InvalidAddress(String),

    /// A working directory could not be created.
    #[error("Failed to prepare directory {path:?}: {source}")]
    Storage {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The group configuration failed validation.
    #[error("Invalid group config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The initial member set cannot be used to start the group.
    #[error("Invalid initial members: {0}")]
    InvalidMembers(String),

    /// The group is already running on this host.
    #[error("{0} already exists")]
    GroupAlreadyExists(GroupId),

    /// The group is not running on this host.
    #[error("{0} not found")]
    GroupNotFound(GroupId),

    /// The change token is not the group's current one.
    #[error("Stale config change id {provided} for {group_id} (current {current})")]
    StaleConfigChange {
        /// Group the change was aimed at
        group_id: GroupId,
        /// Token sent with the request
        provided: u64,
        /// Token currently held by the group
        current: u64,
    },

    /// The replica is already a member of the group.
    #[error("{replica_id} is already a member of {group_id}")]
    DuplicateMember {
        /// Group the change was aimed at
        group_id: GroupId,
        /// Replica that was being added
        replica_id: ReplicaId,
    },

    /// Leadership cannot be handed to a replica outside the group.
    #[error("{target} is not a member of {group_id}")]
    InvalidTarget {
        /// Group the transfer was aimed at
        group_id: GroupId,
        /// Requested new leader
        target: ReplicaId,
    },

    /// State machine failure.
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// The deadline elapsed.
    #[error("Deadline exceeded")]
    Timeout,

    /// The host has been stopped.
    #[error("Node host has been stopped")]
    Closed,
}

impl HostAdaptorError for Error {
    fn kind(&self) -> HostErrorKind {
        match self {
            Self::AddressInUse(_) | Self::InvalidAddress(_) => HostErrorKind::Network,
            Self::Storage { .. } => HostErrorKind::Storage,
            Self::InvalidConfig(_) | Self::InvalidMembers(_) => HostErrorKind::InvalidConfig,
            Self::GroupAlreadyExists(_) => HostErrorKind::GroupAlreadyExists,
            Self::GroupNotFound(_) => HostErrorKind::GroupNotFound,
            Self::StaleConfigChange { .. }
            | Self::DuplicateMember { .. }
            | Self::InvalidTarget { .. } => HostErrorKind::Rejected,
            Self::StateMachine(_) => HostErrorKind::Other,
            Self::Timeout => HostErrorKind::Timeout,
            Self::Closed => HostErrorKind::Closed,
        }
    }
}
