//! Shard manager configuration

use proven_raft_host::{CompressionType, GroupConfig, GroupId, HostConfig, ReplicaId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, ErrorContext, ErrorKind, ShardResult};

/// Default round-trip time between hosts
pub const DEFAULT_RTT: Duration = Duration::from_millis(300);

/// Default deadline for membership changes
pub const DEFAULT_MEMBERSHIP_TIMEOUT: Duration = Duration::from_secs(2);

/// Raft settings applied to every group started by the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPolicy {
    /// Election timeout, in RTTs
    pub election_rtt: u64,

    /// Heartbeat interval, in RTTs
    pub heartbeat_rtt: u64,

    /// Step down when a quorum is not reachable
    pub check_quorum: bool,

    /// Applied entries between snapshots
    pub snapshot_entries: u64,

    /// Entries kept after log compaction
    pub compaction_overhead: u64,

    /// Compression for log entries
    pub entry_compression: CompressionType,

    /// Compression for snapshots
    pub snapshot_compression: CompressionType,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            election_rtt: 10,
            heartbeat_rtt: 1,
            check_quorum: true,
            snapshot_entries: 100_000,
            compaction_overhead: 1,
            entry_compression: CompressionType::Snappy,
            snapshot_compression: CompressionType::Snappy,
        }
    }
}

impl GroupPolicy {
    /// Build the configuration of one group
    pub fn group_config(&self, replica_id: ReplicaId, group_id: GroupId) -> GroupConfig {
        GroupConfig {
            replica_id,
            group_id,
            election_rtt: self.election_rtt,
            heartbeat_rtt: self.heartbeat_rtt,
            check_quorum: self.check_quorum,
            snapshot_entries: self.snapshot_entries,
            compaction_overhead: self.compaction_overhead,
            entry_compression: self.entry_compression,
            snapshot_compression: self.snapshot_compression,
        }
    }
}

fn default_rtt() -> Duration {
    DEFAULT_RTT
}

fn default_membership_timeout() -> Duration {
    DEFAULT_MEMBERSHIP_TIMEOUT
}

/// Shard manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManagerConfig {
    /// This node's replica ID in every group
    pub node_id: ReplicaId,

    /// Raft address this node binds and advertises
    pub bind_address: String,

    /// Root directory for per-node working storage
    pub meta_path: PathBuf,

    /// Round-trip time between hosts
    #[serde(default = "default_rtt")]
    pub rtt: Duration,

    /// Deadline for an `add_node` call
    #[serde(default = "default_membership_timeout")]
    pub membership_timeout: Duration,

    /// Raft settings for started groups
    #[serde(default)]
    pub group_policy: GroupPolicy,
}

impl ShardManagerConfig {
    /// Create a configuration with default timings and group policy
    pub fn new(
        node_id: impl Into<ReplicaId>,
        bind_address: impl Into<String>,
        meta_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            bind_address: bind_address.into(),
            meta_path: meta_path.into(),
            rtt: DEFAULT_RTT,
            membership_timeout: DEFAULT_MEMBERSHIP_TIMEOUT,
            group_policy: GroupPolicy::default(),
        }
    }

    /// Set the round-trip time
    pub fn with_rtt(mut self, rtt: Duration) -> Self {
        self.rtt = rtt;
        self
    }

    /// Set the membership change deadline
    pub fn with_membership_timeout(mut self, timeout: Duration) -> Self {
        self.membership_timeout = timeout;
        self
    }

    /// Set the group policy
    pub fn with_group_policy(mut self, policy: GroupPolicy) -> Self {
        self.group_policy = policy;
        self
    }

    /// Working directory of this node, scoped by its ID
    pub fn node_dir(&self) -> PathBuf {
        self.meta_path.join(format!("node-{}", self.node_id.value()))
    }

    /// Configuration of the node host
    pub fn host_config(&self) -> HostConfig {
        let node_dir = self.node_dir();
        HostConfig {
            wal_dir: node_dir.clone(),
            node_host_dir: node_dir,
            rtt: self.rtt,
            raft_address: self.bind_address.clone(),
        }
    }

    /// Configuration of one group hosted by this node
    pub fn group_config(&self, group_id: GroupId) -> GroupConfig {
        self.group_policy.group_config(self.node_id, group_id)
    }

    /// Reject configurations no host could start with
    pub fn validate(&self) -> ShardResult<()> {
        if self.node_id.is_none() {
            return Err(Error::configuration("node id must not be 0"));
        }

        if self.bind_address.trim().is_empty() {
            return Err(Error::configuration("bind address must not be empty"));
        }

        if self.rtt.is_zero() {
            return Err(Error::configuration("rtt must be greater than 0"));
        }

        self.group_config(GroupId::new(1))
            .validate()
            .map_err(|e| {
                Error::new(
                    ErrorKind::Configuration,
                    ErrorContext::Chain {
                        message: "invalid group policy".to_string(),
                        source: Box::new(e),
                    },
                )
            })
    }
}
