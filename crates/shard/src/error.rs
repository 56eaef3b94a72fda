//! Error types for shard management

use crate::ring::RingError;
use shardvault_core::VaultError;
use shardvault_index::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the shard manager
#[derive(Debug, Error)]
pub enum ShardError {
    /// Routing on an empty ring
    #[error(transparent)]
    Ring(#[from] RingError),

    /// Shard index outside `0..count`
    #[error("Shard {index} out of range (shard count {count})")]
    ShardOutOfRange {
        /// Requested index
        index: usize,
        /// Current shard count
        count: usize,
    },

    /// A registered shard has no file on disk
    #[error("Shard {index} is registered but its file is missing: {}", path.display())]
    ShardFileMissing {
        /// Shard index
        index: usize,
        /// Expected file path
        path: PathBuf,
    },

    /// Requested shard count is not usable
    #[error("Invalid shard count: {0}")]
    InvalidShardCount(usize),

    /// Index or codec failure inside a shard
    #[error(transparent)]
    Index(#[from] IndexError),

    /// File adapter failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for shard operations
pub type ShardResult<T> = Result<T, ShardError>;

impl From<ShardError> for VaultError {
    fn from(e: ShardError) -> Self {
        match e {
            ShardError::Index(inner) => inner.into(),
            ShardError::Io(io) => VaultError::Io(io),
            other => VaultError::Shard(other.to_string()),
        }
    }
}
