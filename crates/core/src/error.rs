//! Error types for Shardvault
//!
//! Every crate keeps its own error enum close to the code that raises it
//! and converts into [`VaultError`] at the crate boundary. We use
//! `thiserror` for `Display` and `Error` implementations.

use std::io;
use thiserror::Error;

/// Result type alias for vault operations
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum VaultError {
    /// I/O error (shard files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Vector width does not match the shard schema
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Width declared by the schema
        expected: usize,
        /// Width of the offending vector
        got: usize,
    },

    /// Filter references an unknown field or uses an unsupported condition
    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter {
        /// Field named by the filter
        field: String,
        /// Why the condition was rejected
        reason: String,
    },

    /// A document reached the repository without a stable id
    #[error("Document has no id")]
    MissingDocumentId,

    /// Document lookup by id found nothing
    #[error("Document not found: {id}")]
    DocumentNotFound {
        /// The missing id
        id: String,
    },

    /// Shard layer error (routing, loading, rebalancing)
    #[error("Shard error: {0}")]
    Shard(String),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Batch ingestion failed; the store may be partially indexed
    #[error("Reindex failed: {message}")]
    Reindex {
        /// Message of the underlying cause
        message: String,
    },

    /// Invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Check if this error indicates missing data
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::DocumentNotFound { .. })
    }

    /// Check if this error is a caller-side validation failure
    ///
    /// Validation failures are never retried.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            VaultError::DimensionMismatch { .. }
                | VaultError::InvalidFilter { .. }
                | VaultError::MissingDocumentId
                | VaultError::Config(_)
        )
    }

    /// Wrap this error as a failed reindex, keeping the cause message
    pub fn into_reindex(self) -> Self {
        match self {
            VaultError::Reindex { .. } => self,
            other => VaultError::Reindex {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
