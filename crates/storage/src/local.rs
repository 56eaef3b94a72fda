//! Local filesystem adapter
//!
//! Relative paths resolve against the vault root. Writes go to a sibling
//! temp file first and are renamed into place, so a crash mid-write never
//! leaves a truncated shard behind.

use crate::adapter::{FileAdapter, FileStat};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// [`FileAdapter`] over `tokio::fs`
#[derive(Debug, Clone)]
pub struct LocalFileAdapter {
    root: PathBuf,
}

impl LocalFileAdapter {
    /// Adapter resolving relative paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileAdapter { root: root.into() }
    }

    /// Vault root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn millis(time: io::Result<SystemTime>) -> Option<i64> {
    time.ok()
        .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
}

#[async_trait]
impl FileAdapter for LocalFileAdapter {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(self.resolve(path)).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)).await
    }

    async fn write(&self, filename: &str, dir: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = self.resolve(dir);
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(filename);
        let tmp = dir.join(format!("{filename}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        debug!(target: "shardvault::storage", path = %target.display(), bytes = bytes.len(), "Wrote file");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(self.resolve(path)).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = tokio::fs::metadata(self.resolve(path)).await?;
        let mtime = millis(meta.modified()).unwrap_or_default();
        // not every filesystem records a birth time
        let ctime = millis(meta.created()).unwrap_or(mtime);
        Ok(FileStat {
            ctime,
            mtime,
            size: meta.len(),
        })
    }
}
