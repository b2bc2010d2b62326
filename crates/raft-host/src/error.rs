//! Error kinds shared by node host implementations

use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for `NodeHost` / `HostAdaptor` errors
pub trait HostAdaptorError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> HostErrorKind;
}

/// The kind of node host error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostErrorKind {
    /// The deadline elapsed before the operation completed
    Timeout,

    /// The group is not running on this host
    GroupNotFound,

    /// The group has already been started on this host
    GroupAlreadyExists,

    /// The request was rejected (stale config change id, invalid target, ...)
    Rejected,

    /// Host or group configuration is invalid
    InvalidConfig,

    /// Working storage could not be used
    Storage,

    /// Address or transport failure
    Network,

    /// The host has been stopped
    Closed,

    /// Other/unknown error
    Other,
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
