//! Log Subsystem Error Types

use std::io;

use thiserror::Error;

/// Result type for log record store operations
pub type LogStoreResult<T> = Result<T, LogStoreError>;

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// A log line that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogParseError {
    #[error("Empty line")]
    Empty,

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("{tag} record needs {expected} fields, found {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Bad timestamp: {0}")]
    BadTimestamp(String),

    #[error("Bad {field} field: '{value}'")]
    BadField { field: &'static str, value: String },
}

/// Log record store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogStoreError {
    #[error("Record id {0} already stored")]
    DuplicateId(u64),

    #[error("Record has no id")]
    MissingId,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Spool ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Spool I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] LogStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = LogParseError::FieldCount {
            tag: "PUB",
            expected: 11,
            found: 4,
        };
        assert_eq!(err.to_string(), "PUB record needs 11 fields, found 4");
        assert_eq!(
            LogStoreError::DuplicateId(9).to_string(),
            "Record id 9 already stored"
        );
    }

    #[test]
    fn test_io_converts() {
        let err: IngestError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
