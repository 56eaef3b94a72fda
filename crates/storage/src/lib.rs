//! Storage layer for shardvault
//!
//! Shards are persisted through an abstract [`FileAdapter`] so the shard
//! manager never touches a filesystem directly:
//! - [`LocalFileAdapter`]: tokio filesystem rooted at a vault directory
//! - [`MemoryFileAdapter`]: in-memory vault with operation counters
//! - [`testing`]: fault injection and size overrides for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod local;
pub mod memory;
pub mod testing;

pub use adapter::{FileAdapter, FileStat};
pub use local::LocalFileAdapter;
pub use memory::{AdapterOps, MemoryFileAdapter};
