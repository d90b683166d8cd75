//! Bitset Error Types

use thiserror::Error;

/// Result type for bitset operations
pub type BitsetResult<T> = Result<T, BitsetError>;

/// Bitset errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsetError {
    #[error("Invalid range: from {from} to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Invalid bitset text: {0}")]
    Parse(String),
}

impl BitsetError {
    /// Create an invalid range error.
    pub fn invalid_range(from: u64, to: u64) -> Self {
        Self::InvalidRange { from, to }
    }
}
