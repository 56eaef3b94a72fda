//! Error types for the shard index

use shardvault_core::VaultError;
use thiserror::Error;

/// Errors raised by a single shard index
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector width doesn't match the schema
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Width declared by the schema
        expected: usize,
        /// Width of the provided vector
        got: usize,
    },

    /// Filter names an unknown field or an unsupported condition
    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Document id is empty
    #[error("Document id is empty")]
    MissingId,

    /// Strict insert of an id that is already present
    #[error("Duplicate document id: {id}")]
    DuplicateId {
        /// The id already present
        id: String,
    },

    /// Lookup of an id that is not in this shard
    #[error("Document not found: {id}")]
    DocumentNotFound {
        /// The missing id
        id: String,
    },

    /// Shard file was written by an unknown format version
    #[error("Unsupported shard format version: {0}")]
    UnsupportedVersion(u8),

    /// Shard file is truncated or malformed
    #[error("Corrupt shard file: {0}")]
    Corrupt(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    /// Check if this error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            IndexError::DimensionMismatch { .. }
                | IndexError::InvalidFilter { .. }
                | IndexError::MissingId
                | IndexError::DuplicateId { .. }
        )
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Corrupt(e.to_string())
    }
}

impl From<IndexError> for VaultError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::DimensionMismatch { expected, got } => {
                VaultError::DimensionMismatch { expected, got }
            }
            IndexError::InvalidFilter { field, reason } => VaultError::InvalidFilter { field, reason },
            IndexError::MissingId => VaultError::MissingDocumentId,
            IndexError::DocumentNotFound { id } => VaultError::DocumentNotFound { id },
            IndexError::Serialization(msg) => VaultError::Serialization(msg),
            other => VaultError::Shard(other.to_string()),
        }
    }
}
