//! File adapter capability
//!
//! The shard manager persists through this trait only. Any backend
//! satisfying it (local disk, an editor's virtual filesystem, a blob store)
//! works without changes to the manager.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// File timestamps and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStat {
    /// Creation time, Unix milliseconds
    pub ctime: i64,
    /// Last modification time, Unix milliseconds
    pub mtime: i64,
    /// Size in bytes
    pub size: u64,
}

/// Storage capability used for shard files
#[async_trait]
pub trait FileAdapter: Send + Sync {
    /// Check whether a file or directory exists
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read a whole file
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `bytes` to `dir/filename`, creating `dir` if missing
    async fn write(&self, filename: &str, dir: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Delete a file
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Timestamps and size of a file
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Join path segments
    fn join(&self, segments: &[&str]) -> PathBuf {
        segments.iter().collect()
    }
}
