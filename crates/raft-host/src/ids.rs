//! Identifier types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Consensus group identifier
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GroupId(u64);

impl GroupId {
    /// Create a new group ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Replica (node) identifier within a group
///
/// The value `0` is reserved: it never names a real replica and is used as the
/// "no leader" marker in leader events.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ReplicaId(u64);

impl ReplicaId {
    /// Sentinel for "no leader currently known"
    pub const NONE: ReplicaId = ReplicaId(0);

    /// Create a new replica ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is the "no leader" sentinel
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica-{}", self.0)
    }
}

impl From<u64> for ReplicaId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
