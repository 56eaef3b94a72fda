//! Shard manager
//!
//! Owns the hash ring and the LRU cache of resident shards, and moves shards
//! between memory and their files.
//!
//! # Residency
//!
//! A shard is either resident (in the cache), pending write-back (evicted,
//! persist in flight) or only on disk. Lookups check those three places in
//! that order, so a shard whose write-back has not finished is reclaimed
//! instead of being re-read from a stale file.
//!
//! # Locking
//!
//! - cache, pending write-backs and slot map: `parking_lot::Mutex`, never
//!   held across an `.await`
//! - per-shard slot: `tokio::sync::Mutex`, serializes loads and persists of
//!   the same index; a task never holds two slots at once
//! - shard contents: `parking_lot::RwLock` inside each handle

use crate::cache::{ShardCache, DEFAULT_CACHE_CAPACITY};
use crate::error::{ShardError, ShardResult};
use crate::ring::{HashRing, DEFAULT_REPLICAS};
use parking_lot::{Mutex, RwLock};
use shardvault_index::{ShardData, ShardIndex, ShardSchema};
use shardvault_storage::FileAdapter;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Shared handle to a loaded shard
pub type ShardHandle = Arc<RwLock<ShardIndex>>;

/// File name of shard `index` (1-indexed on disk)
pub fn shard_file_name(index: usize) -> String {
    format!("vectorstore-{}", index + 1)
}

/// Size thresholds driving [`ShardManager::auto_rebalance`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoRebalanceConfig {
    /// Average shard size above which the shard count doubles
    pub upper_mb: f64,
    /// Average shard size below which the shard count halves
    pub lower_mb: f64,
    /// Halving never goes below this
    pub min_shards: usize,
    /// Doubling never goes above this
    pub max_shards: usize,
}

impl Default for AutoRebalanceConfig {
    fn default() -> Self {
        AutoRebalanceConfig {
            upper_mb: 500.0,
            lower_mb: 100.0,
            min_shards: 2,
            max_shards: 32,
        }
    }
}

/// Shard manager configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerOptions {
    /// Maximum number of resident shards
    pub cache_capacity: usize,
    /// Virtual nodes per shard on the ring
    pub replicas: usize,
    /// Auto-rebalance thresholds
    pub auto_rebalance: AutoRebalanceConfig,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            replicas: DEFAULT_REPLICAS,
            auto_rebalance: AutoRebalanceConfig::default(),
        }
    }
}

/// Per-shard summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardStats {
    /// Zero-based shard index
    pub index: usize,
    /// Number of documents (0 if the file is missing)
    pub documents: usize,
    /// File size in bytes, `None` if the file is missing
    pub file_size: Option<u64>,
    /// Whether the shard is currently in the cache
    pub resident: bool,
}

pub(crate) struct Eviction {
    pub(crate) index: usize,
    pub(crate) handle: ShardHandle,
    generation: u64,
}

/// Routes documents to shards and manages shard residency
pub struct ShardManager {
    pub(crate) fs: Arc<dyn FileAdapter>,
    pub(crate) dir: PathBuf,
    pub(crate) schema: ShardSchema,
    pub(crate) options: ManagerOptions,
    pub(crate) shard_count: usize,
    pub(crate) ring: HashRing,
    pub(crate) cache: Mutex<ShardCache<ShardHandle>>,
    /// Evicted shards whose write-back has not finished
    pub(crate) evicting: Mutex<BTreeMap<usize, (ShardHandle, u64)>>,
    pub(crate) slots: Mutex<BTreeMap<usize, Arc<AsyncMutex<()>>>>,
    generation: AtomicU64,
}

impl ShardManager {
    /// Open the shard store in `dir`
    ///
    /// Existing shard files are detected by probing `vectorstore-1`,
    /// `vectorstore-2`, ... until one is missing. Each detected shard is
    /// loaded once and written straight back so it is re-encoded under the
    /// current schema. A missing or empty directory gets one fresh shard.
    pub async fn open(
        fs: Arc<dyn FileAdapter>,
        dir: impl Into<PathBuf>,
        schema: ShardSchema,
        options: ManagerOptions,
    ) -> ShardResult<Self> {
        let dir = dir.into();
        let detected = if fs.exists(&dir).await? {
            detect_shard_count(fs.as_ref(), &dir).await?
        } else {
            0
        };
        let shard_count = detected.max(1);

        let manager = ShardManager {
            ring: HashRing::with_nodes(shard_count, options.replicas),
            cache: Mutex::new(ShardCache::new(options.cache_capacity)),
            evicting: Mutex::new(BTreeMap::new()),
            slots: Mutex::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            fs,
            dir,
            schema,
            options,
            shard_count,
        };

        if detected == 0 {
            info!(target: "shardvault::shard", dir = %manager.dir.display(), "Creating new shard store");
            let handle = manager.create_shard(0).await?;
            manager.admit(0, handle).await?;
        } else {
            info!(target: "shardvault::shard", dir = %manager.dir.display(), shards = detected, "Opening shard store");
            for idx in 0..detected {
                match manager.fetch_shard(idx).await {
                    Ok(handle) => manager.persist_shard(&handle, idx).await?,
                    Err(ShardError::ShardFileMissing { path, .. }) => {
                        warn!(
                            target: "shardvault::shard",
                            shard = idx,
                            path = %path.display(),
                            "Shard file missing, skipping"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(manager)
    }

    /// Current number of shards
    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Schema injected into every loaded shard
    pub fn schema(&self) -> &ShardSchema {
        &self.schema
    }

    /// Directory holding the shard files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Options the manager was opened with
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// The routing ring
    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Path of shard `index`
    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.dir.join(shard_file_name(index))
    }

    /// Shard owning document `id`
    pub fn get_node(&self, id: &str) -> ShardResult<usize> {
        Ok(self.ring.get_node(id)?)
    }

    /// Resident shard indices, least recently used first
    pub fn cached_indices(&self) -> Vec<usize> {
        self.cache.lock().keys()
    }

    /// Load shard `index`, from the cache if resident
    ///
    /// Concurrent calls for the same index share one load. Loading may evict
    /// another shard, which is written back before this returns if it has
    /// unpersisted changes.
    pub async fn get_shard(&self, index: usize) -> ShardResult<ShardHandle> {
        if index >= self.shard_count {
            return Err(ShardError::ShardOutOfRange {
                index,
                count: self.shard_count,
            });
        }
        self.fetch_shard(index).await
    }

    /// Write shard `index` to its file
    ///
    /// Persists of the same index are serialized and each encodes the state
    /// current when it runs, so the last write carries the newest contents.
    pub async fn persist_shard(&self, handle: &ShardHandle, index: usize) -> ShardResult<()> {
        let slot = self.slot(index);
        let _guard = slot.lock().await;

        let (bytes, revision) = {
            let shard = handle.read();
            (shard.encode()?, shard.revision())
        };
        self.fs
            .write(&shard_file_name(index), &self.dir, &bytes)
            .await?;
        handle.write().mark_persisted(revision);
        debug!(target: "shardvault::shard", shard = index, bytes = bytes.len(), "Persisted shard");
        Ok(())
    }

    /// Persist every modified resident shard and release all of them
    pub async fn flush(&mut self) -> ShardResult<()> {
        let resident = self.cache.get_mut().entries();
        let persists = resident
            .iter()
            .filter(|(_, handle)| handle.read().is_dirty())
            .map(|(idx, handle)| self.persist_shard(handle, *idx));
        futures::future::try_join_all(persists).await?;

        self.cache.get_mut().clear();
        debug!(target: "shardvault::shard", released = resident.len(), "Flushed shards");
        Ok(())
    }

    /// Per-shard document counts, file sizes and residency
    ///
    /// Shards that are not resident are decoded for counting but not
    /// admitted into the cache.
    pub async fn stats(&self) -> ShardResult<Vec<ShardStats>> {
        let mut stats = Vec::with_capacity(self.shard_count);
        for index in 0..self.shard_count {
            let path = self.shard_path(index);
            let file_size = match self.fs.stat(&path).await {
                Ok(stat) => Some(stat.size),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };

            let resident = self.cache.lock().has(index);
            let in_memory = self.peek_shard(index);
            let documents = match in_memory {
                Some(handle) => handle.read().len(),
                None if file_size.is_some() => self.load_shard(index).await?.len(),
                None => 0,
            };

            stats.push(ShardStats {
                index,
                documents,
                file_size,
                resident,
            });
        }
        Ok(stats)
    }

    /// Cache-then-pending-then-disk lookup without a range check
    pub(crate) async fn fetch_shard(&self, index: usize) -> ShardResult<ShardHandle> {
        let cached = self.cache.lock().get(index).cloned();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let slot = self.slot(index);
        let guard = slot.lock().await;

        // another task may have finished loading while we waited
        let cached = self.cache.lock().get(index).cloned();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let pending = self.evicting.lock().get(&index).map(|(h, _)| h.clone());
        let handle = match pending {
            Some(handle) => {
                debug!(target: "shardvault::shard", shard = index, "Reclaimed shard pending write-back");
                handle
            }
            None => Arc::new(RwLock::new(self.load_shard(index).await?)),
        };

        let evicted = self.insert_resident(index, handle.clone());
        drop(guard);

        if let Some(eviction) = evicted {
            self.write_back(eviction).await?;
        }
        Ok(handle)
    }

    /// Create an empty shard and persist it; the handle is not cached
    pub(crate) async fn create_shard(&self, index: usize) -> ShardResult<ShardHandle> {
        let handle = Arc::new(RwLock::new(ShardIndex::new(self.schema.clone())));
        self.persist_shard(&handle, index).await?;
        debug!(target: "shardvault::shard", shard = index, "Created shard");
        Ok(handle)
    }

    /// Make `handle` resident, writing back whatever it evicts
    pub(crate) async fn admit(&self, index: usize, handle: ShardHandle) -> ShardResult<()> {
        if let Some(eviction) = self.insert_resident(index, handle) {
            self.write_back(eviction).await?;
        }
        Ok(())
    }

    pub(crate) async fn load_shard(&self, index: usize) -> ShardResult<ShardIndex> {
        let path = self.shard_path(index);
        let bytes = match self.fs.read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShardError::ShardFileMissing { index, path });
            }
            Err(e) => return Err(e.into()),
        };

        let shard = ShardData::decode(&bytes)?.rehydrate(self.schema.clone())?;
        debug!(target: "shardvault::shard", shard = index, documents = shard.len(), "Loaded shard");
        Ok(shard)
    }

    /// Delete a shard file, tolerating one that is already gone
    pub(crate) async fn delete_shard_file(&self, index: usize) -> ShardResult<()> {
        match self.fs.delete(&self.shard_path(index)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn peek_shard(&self, index: usize) -> Option<ShardHandle> {
        let cached = self.cache.lock().peek(index).cloned();
        cached.or_else(|| self.evicting.lock().get(&index).map(|(h, _)| h.clone()))
    }

    /// Insert into the cache; the evicted shard is registered as pending
    /// before the cache lock is released
    fn insert_resident(&self, index: usize, handle: ShardHandle) -> Option<Eviction> {
        let mut eviction = None;
        self.cache.lock().set_with(index, handle, |evicted_index, evicted| {
            let generation = self.generation.fetch_add(1, Ordering::Relaxed);
            self.evicting
                .lock()
                .insert(evicted_index, (evicted.clone(), generation));
            eviction = Some(Eviction {
                index: evicted_index,
                handle: evicted,
                generation,
            });
        });
        eviction
    }

    async fn write_back(&self, eviction: Eviction) -> ShardResult<()> {
        let dirty = eviction.handle.read().is_dirty();
        let result = if dirty {
            debug!(target: "shardvault::shard", shard = eviction.index, "Writing back evicted shard");
            self.persist_shard(&eviction.handle, eviction.index).await
        } else {
            debug!(target: "shardvault::shard", shard = eviction.index, "Evicted shard is clean, skipping write-back");
            Ok(())
        };

        let mut evicting = self.evicting.lock();
        let current = evicting
            .get(&eviction.index)
            .is_some_and(|(_, g)| *g == eviction.generation);
        if current {
            evicting.remove(&eviction.index);
        }
        drop(evicting);

        if let Err(e) = &result {
            warn!(target: "shardvault::shard", shard = eviction.index, error = %e, "Write-back of evicted shard failed");
        }
        result
    }

    fn slot(&self, index: usize) -> Arc<AsyncMutex<()>> {
        self.slots
            .lock()
            .entry(index)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Number of consecutive shard files starting at `vectorstore-1`
async fn detect_shard_count(fs: &dyn FileAdapter, dir: &Path) -> ShardResult<usize> {
    let mut count = 0;
    while fs.exists(&dir.join(shard_file_name(count))).await? {
        count += 1;
    }
    Ok(count)
}
