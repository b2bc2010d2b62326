//! Error types for the shard coordination layer

use std::fmt;

use proven_raft_host::{HostAdaptorError, HostErrorKind};
use thiserror::Error;

/// Result type for shard operations
pub type ShardResult<T> = Result<T, Error>;

/// Main error type for shard operations
#[derive(Debug, Error)]
pub struct Error {
    /// Error kind
    kind: ErrorKind,
    /// Error context
    context: ErrorContext,
}

impl Error {
    /// Create a new error
    pub fn new(kind: ErrorKind, context: ErrorContext) -> Self {
        Self { kind, context }
    }

    /// Create error with string context
    pub fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: ErrorContext::Message(context.into()),
        }
    }

    /// Wrap a node host error
    ///
    /// Timeouts, missing groups, rejections and closed hosts keep their own kind
    /// so callers can tell them apart; anything else is reported as `fallback`.
    pub fn from_host<E: HostAdaptorError>(
        fallback: ErrorKind,
        message: impl Into<String>,
        err: E,
    ) -> Self {
        let kind = match err.kind() {
            HostErrorKind::Timeout => ErrorKind::Timeout,
            HostErrorKind::GroupNotFound => ErrorKind::NotFound,
            HostErrorKind::Rejected => ErrorKind::Rejected,
            HostErrorKind::Closed => ErrorKind::Closed,
            HostErrorKind::GroupAlreadyExists
            | HostErrorKind::InvalidConfig
            | HostErrorKind::Storage
            | HostErrorKind::Network
            | HostErrorKind::Other => fallback,
        };

        Self {
            kind,
            context: ErrorContext::Chain {
                message: message.into(),
                source: Box::new(err),
            },
        }
    }

    /// Get error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get error context
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Configuration, msg)
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Timeout, msg)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            ErrorContext::Message(msg) => write!(f, "{}: {}", self.kind, msg),
            ErrorContext::Chain { message, source } => {
                write!(f, "{}: {} (caused by: {})", self.kind, message, source)
            }
        }
    }
}

/// Error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Node host or group could not be started
    Bootstrap,
    /// Invalid configuration
    Configuration,
    /// Membership query or change failed
    Membership,
    /// Leadership transfer request failed
    LeaderTransfer,
    /// Proposal was not applied
    Proposal,
    /// Operation timed out
    Timeout,
    /// Request rejected by the engine
    Rejected,
    /// No tracked group to route to
    NoActiveGroups,
    /// Group not found on this host
    NotFound,
    /// Node host has been stopped
    Closed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Bootstrap => write!(f, "Bootstrap error"),
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::Membership => write!(f, "Membership error"),
            ErrorKind::LeaderTransfer => write!(f, "Leader transfer error"),
            ErrorKind::Proposal => write!(f, "Proposal failed"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::Rejected => write!(f, "Rejected"),
            ErrorKind::NoActiveGroups => write!(f, "No active groups"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Closed => write!(f, "Closed"),
        }
    }
}

/// Error context
#[derive(Debug)]
pub enum ErrorContext {
    /// Simple message
    Message(String),
    /// Error chain with source
    Chain {
        /// Error message
        message: String,
        /// Source error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
