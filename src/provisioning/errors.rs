//! Provisioning Store Error Types

use thiserror::Error;

use super::entity::EntityKind;

/// Result type for provisioning store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Provisioning store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: EntityKind, key: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound { .. } => 404,
            StoreError::AlreadyExists { .. } => 409,
            StoreError::Backend(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let missing = StoreError::NotFound {
            kind: EntityKind::Feed,
            key: "7".into(),
        };
        assert_eq!(missing.status_code(), 404);
        assert_eq!(StoreError::Backend("disk".into()).status_code(), 500);
        assert_eq!(missing.to_string(), "feed '7' not found");
    }
}
