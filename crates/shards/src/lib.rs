//! Multi-group consensus coordination for Proven nodes
//!
//! This crate provides:
//! - Parsing of `id@address` member lists
//! - A leadership tracker fed by the consensus engine's leader events
//! - The shard manager: group bootstrap, membership changes, leadership transfer
//! - Key-based routing of proposals onto active groups
//!
//! The consensus engine itself is reached through the `proven-raft-host` traits.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod host;
pub mod manager;
pub mod peers;
pub mod router;
pub mod tracker;

pub use config::{GroupPolicy, ShardManagerConfig};
pub use error::{Error, ErrorKind, ShardResult};
pub use host::HostAdapter;
pub use manager::ShardManager;
pub use peers::{PeerAddressMap, parse_peer_list};
pub use router::{RequestRouter, select_group};
pub use tracker::{ClusterMap, LeadershipTracker};
