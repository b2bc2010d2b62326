//! Host and group configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::{GroupId, ReplicaId};

/// Configuration errors reported by `GroupConfig::validate`
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Replica ID is the reserved value 0
    #[error("replica id must not be 0")]
    InvalidReplicaId,

    /// Heartbeat RTT is 0
    #[error("heartbeat rtt must be greater than 0")]
    InvalidHeartbeatRtt,

    /// Election RTT is not large enough relative to the heartbeat RTT
    #[error("election rtt ({election_rtt}) must exceed 2x heartbeat rtt ({heartbeat_rtt})")]
    InvalidElectionRtt {
        /// Configured election RTT
        election_rtt: u64,
        /// Configured heartbeat RTT
        heartbeat_rtt: u64,
    },
}

/// Compression applied to log entries or snapshots
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    /// No compression
    NoCompression,
    /// Snappy compression
    #[default]
    Snappy,
}

/// Configuration used to create a node host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Directory holding the write-ahead log
    pub wal_dir: PathBuf,

    /// Directory holding host metadata and snapshots
    pub node_host_dir: PathBuf,

    /// Round-trip time between hosts; election and heartbeat RTTs are multiples of this
    pub rtt: Duration,

    /// Address the host binds for raft traffic
    pub raft_address: String,
}

/// Per-group raft configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Local replica ID in the group
    pub replica_id: ReplicaId,

    /// Group this configuration belongs to
    pub group_id: GroupId,

    /// Election timeout, in RTTs
    pub election_rtt: u64,

    /// Heartbeat interval, in RTTs
    pub heartbeat_rtt: u64,

    /// Step down when a quorum is not reachable
    pub check_quorum: bool,

    /// Number of applied entries between automatic snapshots (0 disables them)
    pub snapshot_entries: u64,

    /// Entries kept in the log after compaction
    pub compaction_overhead: u64,

    /// Compression of log entries
    pub entry_compression: CompressionType,

    /// Compression of snapshots
    pub snapshot_compression: CompressionType,
}

impl GroupConfig {
    /// Check the static constraints every engine enforces before starting a group
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replica_id.is_none() {
            return Err(ConfigError::InvalidReplicaId);
        }

        if self.heartbeat_rtt == 0 {
            return Err(ConfigError::InvalidHeartbeatRtt);
        }

        let too_short = self
            .heartbeat_rtt
            .checked_mul(2)
            .is_none_or(|min| self.election_rtt <= min);
        if too_short {
            return Err(ConfigError::InvalidElectionRtt {
                election_rtt: self.election_rtt,
                heartbeat_rtt: self.heartbeat_rtt,
            });
        }

        Ok(())
    }
}
