//! Raft host contract for Proven multi-group consensus
//!
//! This crate provides:
//! - Group and replica identifiers (GroupId, ReplicaId)
//! - Host and per-group configuration
//! - The replicated state machine trait and its factory
//! - Request, session and membership types
//! - The leader event listener trait
//! - The `HostAdaptor` / `NodeHost` traits implemented by consensus engines

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod ids;
pub mod request;
pub mod state_machine;

pub use config::{CompressionType, ConfigError, GroupConfig, HostConfig};
pub use error::{HostAdaptorError, HostErrorKind};
pub use event::{LeaderInfo, RaftEventListener};
pub use host::{HostAdaptor, NodeHost};
pub use ids::{GroupId, ReplicaId};
pub use request::{Membership, RequestResult, RequestState, Session};
pub use state_machine::{
    Entry, StateMachine, StateMachineError, StateMachineFactory, StateMachineResult,
    shared_factory,
};
