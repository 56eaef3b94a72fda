//! Testing utilities for shard persistence
//!
//! [`FaultyFileAdapter`] wraps another adapter and lets a test:
//! - fail reads or writes of specific file names
//! - report an arbitrary size from `stat` (auto-rebalance thresholds)
//! - yield to the scheduler inside `read` to widen race windows
//! - count reads per file name
//!
//! # Example
//!
//! ```ignore
//! use shardvault_storage::{MemoryFileAdapter, testing::FaultyFileAdapter};
//!
//! let fs = FaultyFileAdapter::new(Arc::new(MemoryFileAdapter::new()));
//! fs.fail_reads("vectorstore-1");
//! // every read of .../vectorstore-1 now returns an error
//! ```

use crate::adapter::{FileAdapter, FileStat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Faults {
    failing_reads: BTreeSet<String>,
    failing_writes: BTreeSet<String>,
    sizes: BTreeMap<String, u64>,
    reads: BTreeMap<String, u64>,
}

/// Adapter wrapper with injectable faults
pub struct FaultyFileAdapter {
    inner: Arc<dyn FileAdapter>,
    faults: Mutex<Faults>,
    yield_on_read: AtomicBool,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn injected(op: &str, name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {op} failure: {name}"))
}

impl FaultyFileAdapter {
    /// Wrap `inner` with no faults armed
    pub fn new(inner: Arc<dyn FileAdapter>) -> Self {
        FaultyFileAdapter {
            inner,
            faults: Mutex::new(Faults::default()),
            yield_on_read: AtomicBool::new(false),
        }
    }

    /// Fail every read of files named `name`
    pub fn fail_reads(&self, name: &str) {
        self.faults.lock().failing_reads.insert(name.to_string());
    }

    /// Fail every write of files named `name`
    pub fn fail_writes(&self, name: &str) {
        self.faults.lock().failing_writes.insert(name.to_string());
    }

    /// Report `size` bytes from `stat` for files named `name`
    pub fn set_size(&self, name: &str, size: u64) {
        self.faults.lock().sizes.insert(name.to_string(), size);
    }

    /// Disarm every fault and size override; counters are kept
    pub fn clear(&self) {
        let mut faults = self.faults.lock();
        faults.failing_reads.clear();
        faults.failing_writes.clear();
        faults.sizes.clear();
    }

    /// Yield to the scheduler at the start of every read
    pub fn set_yield_on_read(&self, enabled: bool) {
        self.yield_on_read.store(enabled, Ordering::Relaxed);
    }

    /// Number of reads attempted for files named `name`
    pub fn reads_of(&self, name: &str) -> u64 {
        self.faults.lock().reads.get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FileAdapter for FaultyFileAdapter {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let name = file_name(path);
        let fail = {
            let mut faults = self.faults.lock();
            *faults.reads.entry(name.clone()).or_insert(0) += 1;
            faults.failing_reads.contains(&name)
        };
        if self.yield_on_read.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        if fail {
            return Err(injected("read", &name));
        }
        self.inner.read(path).await
    }

    async fn write(&self, filename: &str, dir: &Path, bytes: &[u8]) -> io::Result<()> {
        if self.faults.lock().failing_writes.contains(filename) {
            return Err(injected("write", filename));
        }
        self.inner.write(filename, dir, bytes).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        self.inner.delete(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let mut stat = self.inner.stat(path).await?;
        if let Some(size) = self.faults.lock().sizes.get(&file_name(path)) {
            stat.size = *size;
        }
        Ok(stat)
    }

    fn join(&self, segments: &[&str]) -> PathBuf {
        self.inner.join(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFileAdapter;

    #[tokio::test]
    async fn test_injected_read_failure() {
        let fs = FaultyFileAdapter::new(Arc::new(MemoryFileAdapter::new()));
        let dir = Path::new("d");
        fs.write("vectorstore-1", dir, b"x").await.unwrap();
        fs.write("vectorstore-2", dir, b"y").await.unwrap();

        fs.fail_reads("vectorstore-1");
        assert!(fs.read(&dir.join("vectorstore-1")).await.is_err());
        assert_eq!(fs.read(&dir.join("vectorstore-2")).await.unwrap(), b"y");
        assert_eq!(fs.reads_of("vectorstore-1"), 1);

        fs.clear();
        assert_eq!(fs.read(&dir.join("vectorstore-1")).await.unwrap(), b"x");
        assert_eq!(fs.reads_of("vectorstore-1"), 2);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let fs = FaultyFileAdapter::new(Arc::new(MemoryFileAdapter::new()));
        fs.fail_writes("f");
        assert!(fs.write("f", Path::new("d"), b"x").await.is_err());
        assert!(!fs.exists(Path::new("d/f")).await.unwrap());
    }

    #[tokio::test]
    async fn test_size_override() {
        let fs = FaultyFileAdapter::new(Arc::new(MemoryFileAdapter::new()));
        fs.write("f", Path::new("d"), b"abc").await.unwrap();
        assert_eq!(fs.stat(Path::new("d/f")).await.unwrap().size, 3);

        fs.set_size("f", 600 * 1024 * 1024);
        assert_eq!(
            fs.stat(Path::new("d/f")).await.unwrap().size,
            600 * 1024 * 1024
        );
    }
}
