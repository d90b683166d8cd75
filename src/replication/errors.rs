//! Replication Error Types
//!
//! Nothing in this subsystem is fatal. Every error aborts the current
//! pass only; the next tick starts again from scratch.

use std::fmt;

/// Replication error type
#[derive(Debug, Clone)]
pub struct ReplicationError {
    /// Error kind
    pub kind: ReplicationErrorKind,
    /// Error message
    pub message: String,
}

/// Replication error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationErrorKind {
    /// Connect failure, timeout, or broken response stream
    Transport,

    /// Peer answered with a non-success status
    Status,

    /// Peer answered with an unexpected content type
    ContentType,

    /// Response body could not be decoded
    Decode,

    /// Writing fetched records into the spool failed
    Spool,

    /// Configuration error
    ConfigurationError,
}

impl ReplicationError {
    /// Create a new replication error.
    pub fn new(kind: ReplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::Transport, message)
    }

    /// Create a bad status error.
    pub fn status(status: u16, url: &str) -> Self {
        Self::new(
            ReplicationErrorKind::Status,
            format!("{} returned status {}", url, status),
        )
    }

    /// Create a content type mismatch error.
    pub fn content_type(found: &str, url: &str) -> Self {
        Self::new(
            ReplicationErrorKind::ContentType,
            format!("{} returned unexpected content type '{}'", url, found),
        )
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::Decode, message)
    }

    /// Create a spool error.
    pub fn spool(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::Spool, message)
    }

    /// Create a configuration error.
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::ConfigurationError, message)
    }

    /// Check if the error is caused by the peer or the network.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ReplicationErrorKind::Transport
                | ReplicationErrorKind::Status
                | ReplicationErrorKind::ContentType
                | ReplicationErrorKind::Decode
        )
    }
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicationError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ReplicationError {}

impl From<reqwest::Error> for ReplicationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;
