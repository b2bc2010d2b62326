//! In-memory node host for testing and local development
//!
//! Hosts every group of a process in memory. Leader election is simulated, so
//! the host reproduces the observable contract of a consensus engine (leader
//! events, versioned membership, deadlines, proposal outcomes) without any
//! replication.

#![warn(missing_docs)]

pub mod error;
mod group;
mod host;

pub use error::Error;
pub use group::Snapshot;
pub use host::{MemoryHost, MemoryHostAdaptor, MemoryHostOptions};
