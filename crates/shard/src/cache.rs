//! LRU residency cache for loaded shards
//!
//! Keeps at most `capacity` shard handles in memory. Eviction hands the
//! least-recently-used entry back to the caller, which is responsible for
//! writing it back before it is dropped.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Default number of resident shards
pub const DEFAULT_CACHE_CAPACITY: usize = 3;

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Bounded LRU map from shard index to `V`
#[derive(Debug)]
pub struct ShardCache<V> {
    entries: LruCache<usize, V>,
}

impl<V> ShardCache<V> {
    /// Create an empty cache; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        ShardCache {
            entries: LruCache::new(non_zero(capacity)),
        }
    }

    /// Get an entry, marking it most recently used
    pub fn get(&mut self, key: usize) -> Option<&V> {
        self.entries.get(&key)
    }

    /// Insert or overwrite an entry, marking it most recently used
    ///
    /// Returns the evicted least-recently-used entry if the cache overflowed.
    #[must_use = "an evicted shard must be written back"]
    pub fn set(&mut self, key: usize, value: V) -> Option<(usize, V)> {
        if self.entries.contains(&key) {
            self.entries.put(key, value);
            return None;
        }
        self.entries.push(key, value)
    }

    /// [`ShardCache::set`] with a synchronous eviction callback
    ///
    /// `on_evict` runs before this returns, while the caller still holds
    /// whatever guards the cache.
    pub fn set_with<F>(&mut self, key: usize, value: V, on_evict: F)
    where
        F: FnOnce(usize, V),
    {
        if let Some((evicted_key, evicted)) = self.set(key, value) {
            on_evict(evicted_key, evicted);
        }
    }

    /// Check presence without touching recency
    pub fn has(&self, key: usize) -> bool {
        self.entries.contains(&key)
    }

    /// Look up without touching recency
    pub fn peek(&self, key: usize) -> Option<&V> {
        self.entries.peek(&key)
    }

    /// Remove an entry without invoking any write-back
    pub fn remove(&mut self, key: usize) -> Option<V> {
        self.entries.pop(&key)
    }

    /// Change capacity, returning entries evicted to fit (LRU first)
    pub fn resize(&mut self, capacity: usize) -> Vec<(usize, V)> {
        let capacity = non_zero(capacity);
        let mut evicted = Vec::new();
        while self.entries.len() > capacity.get() {
            match self.entries.pop_lru() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        self.entries.resize(capacity);
        evicted
    }

    /// Drop every entry without invoking any write-back
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of resident entries
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Resident keys, least recently used first
    pub fn keys(&self) -> Vec<usize> {
        self.entries.iter().rev().map(|(k, _)| *k).collect()
    }
}

impl<V: Clone> ShardCache<V> {
    /// Snapshot of resident entries, least recently used first
    pub fn entries(&self) -> Vec<(usize, V)> {
        self.entries.iter().rev().map(|(k, v)| (*k, v.clone())).collect()
    }
}
