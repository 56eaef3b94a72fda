//! In-memory file adapter
//!
//! Backs tests and ephemeral vaults. Every operation is counted so callers
//! can assert on I/O, e.g. that a no-op rebalance writes nothing.

use crate::adapter::{FileAdapter, FileStat};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    ctime: i64,
    mtime: i64,
}

#[derive(Debug, Default)]
struct MemFs {
    files: BTreeMap<PathBuf, MemFile>,
    dirs: BTreeSet<PathBuf>,
}

/// Snapshot of operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterOps {
    /// Successful and failed reads
    pub reads: u64,
    /// Writes
    pub writes: u64,
    /// Deletes
    pub deletes: u64,
}

/// [`FileAdapter`] keeping everything in memory
#[derive(Debug, Default)]
pub struct MemoryFileAdapter {
    fs: RwLock<MemFs>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryFileAdapter {
    /// Create an empty in-memory filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation counters so far
    pub fn ops(&self) -> AdapterOps {
        AdapterOps {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Paths of every stored file, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.fs.read().files.keys().cloned().collect()
    }

    /// Create a directory (and its ancestors) without writing a file
    pub fn create_dir(&self, dir: &Path) {
        let mut fs = self.fs.write();
        for ancestor in dir.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                fs.dirs.insert(ancestor.to_path_buf());
            }
        }
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

#[async_trait]
impl FileAdapter for MemoryFileAdapter {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        let fs = self.fs.read();
        Ok(fs.files.contains_key(path) || fs.dirs.contains(path))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.fs
            .read()
            .files
            .get(path)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| not_found(path))
    }

    async fn write(&self, filename: &str, dir: &Path, bytes: &[u8]) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.create_dir(dir);

        let now = chrono::Utc::now().timestamp_millis();
        let mut fs = self.fs.write();
        let file = fs.files.entry(dir.join(filename)).or_insert_with(|| MemFile {
            bytes: Vec::new(),
            ctime: now,
            mtime: now,
        });
        file.bytes = bytes.to_vec();
        file.mtime = now;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.fs
            .write()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        self.fs
            .read()
            .files
            .get(path)
            .map(|f| FileStat {
                ctime: f.ctime,
                mtime: f.mtime,
                size: f.bytes.len() as u64,
            })
            .ok_or_else(|| not_found(path))
    }
}
