//! Rebalance, auto-rebalance and reset
//!
//! A rebalance moves exactly the documents whose owner differs between the
//! current ring and a fresh ring with the target shard count:
//!
//! 1. collect every id (nothing is mutated yet; a load failure aborts)
//! 2. on growth, create and persist the new empty shards
//! 3. move each document: upsert into the new owner, then remove from the
//!    old one; a failed move is logged and counted, never fatal
//! 4. persist every modified shard that survives
//! 5. on shrink, delete the files of removed shards
//! 6. swap in the new ring and resize the cache to the new shard count
//!
//! An I/O failure in steps 2, 4 or 5 rolls back: moved documents return to
//! their old shard, shards already rewritten are written again, and the
//! files created in step 2 are deleted. The ring, shard count and set of
//! shard files are then what they were before the call, so a reopen detects
//! the old shard count. Once the first removed file is gone in step 5 the
//! shrink is committed; a later delete failure only leaves an orphan file
//! past the gap, which shard detection ignores.

use crate::error::{ShardError, ShardResult};
use crate::manager::ShardManager;
use crate::ring::{HashRing, MovedId};
use shardvault_index::IndexError;
use std::io;
use tracing::{debug, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of a rebalance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceReport {
    /// Shard count before
    pub from_count: usize,
    /// Shard count after
    pub to_count: usize,
    /// Documents moved to their new owner
    pub moved: usize,
    /// Documents that could not be moved
    pub failed_moves: usize,
}

impl RebalanceReport {
    /// Check if the shard count did not change
    pub fn is_noop(&self) -> bool {
        self.from_count == self.to_count
    }
}

impl ShardManager {
    /// Redistribute documents over `new_count` shards
    pub async fn rebalance(&mut self, new_count: usize) -> ShardResult<RebalanceReport> {
        let from_count = self.shard_count;
        if new_count == 0 {
            return Err(ShardError::InvalidShardCount(new_count));
        }
        let mut report = RebalanceReport {
            from_count,
            to_count: new_count,
            moved: 0,
            failed_moves: 0,
        };
        if new_count == from_count {
            debug!(target: "shardvault::rebalance", shards = from_count, "Shard count unchanged");
            return Ok(report);
        }

        info!(target: "shardvault::rebalance", from = from_count, to = new_count, "Rebalancing shards");

        let mut ids = Vec::new();
        for idx in 0..from_count {
            let handle = self.fetch_shard(idx).await?;
            ids.extend(handle.read().ids());
        }
        let moves = self
            .ring
            .diff_moved_ids(new_count, ids.iter().map(String::as_str))?;
        debug!(target: "shardvault::rebalance", documents = ids.len(), moves = moves.len(), "Computed moves");

        // every shard stays resident while documents move, so a half-moved
        // shard is never evicted and reloaded as a second copy
        let cache = self.cache.get_mut();
        let capacity = cache.capacity();
        let evicted = cache.resize(capacity.max(from_count).max(new_count));
        debug_assert!(evicted.is_empty());

        for idx in from_count..new_count {
            if let Err(e) = self.create_shard(idx).await {
                self.roll_back(from_count, new_count, &[], &[], capacity).await;
                return Err(e);
            }
        }

        let mut moved: Vec<&MovedId> = Vec::with_capacity(moves.len());
        for mv in &moves {
            match self.transfer(&mv.id, mv.from, mv.to).await {
                Ok(()) => moved.push(mv),
                Err(e) => {
                    report.failed_moves += 1;
                    warn!(
                        target: "shardvault::rebalance",
                        id = %mv.id,
                        from = mv.from,
                        to = mv.to,
                        error = %e,
                        "Failed to move document"
                    );
                }
            }
        }
        report.moved = moved.len();

        let mut written = Vec::new();
        let resident = self.cache.get_mut().entries();
        for (idx, handle) in resident.iter().filter(|(idx, _)| *idx < new_count) {
            if !handle.read().is_dirty() {
                continue;
            }
            if let Err(e) = self.persist_shard(handle, *idx).await {
                self.roll_back(from_count, new_count, &moved, &written, capacity).await;
                return Err(e);
            }
            written.push(*idx);
        }

        for idx in new_count..from_count {
            match self.delete_shard_file(idx).await {
                Ok(()) => {}
                Err(e) if idx == new_count => {
                    self.roll_back(from_count, new_count, &moved, &written, capacity).await;
                    return Err(e);
                }
                Err(e) => warn!(
                    target: "shardvault::rebalance",
                    shard = idx,
                    error = %e,
                    "Failed to delete file of removed shard"
                ),
            }
        }
        for idx in new_count..from_count {
            self.cache.get_mut().remove(idx);
        }

        self.ring = HashRing::with_nodes(new_count, self.options.replicas);
        self.shard_count = new_count;
        // everything left resident was persisted above
        let released = self.cache.get_mut().resize(new_count);
        self.slots.get_mut().retain(|idx, _| *idx < new_count);

        info!(
            target: "shardvault::rebalance",
            from = from_count,
            to = new_count,
            moved = report.moved,
            failed = report.failed_moves,
            released = released.len(),
            "Rebalance complete"
        );
        Ok(report)
    }

    /// Target shard count suggested by the average shard file size, if it
    /// differs from the current one
    pub async fn plan_auto_rebalance(&self) -> ShardResult<Option<usize>> {
        let config = self.options.auto_rebalance;
        let count = self.shard_count;

        let mut total_bytes = 0u64;
        let mut files = 0usize;
        for idx in 0..count {
            match self.fs.stat(&self.shard_path(idx)).await {
                Ok(stat) => {
                    total_bytes += stat.size;
                    files += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if files == 0 {
            return Ok(None);
        }

        let average_mb = total_bytes as f64 / files as f64 / BYTES_PER_MB;
        let planned = if average_mb > config.upper_mb && count < config.max_shards {
            (count * 2).min(config.max_shards)
        } else if average_mb < config.lower_mb && count > config.min_shards {
            (count / 2).max(config.min_shards)
        } else {
            count
        };

        debug!(
            target: "shardvault::rebalance",
            average_mb,
            shards = count,
            planned,
            "Auto-rebalance plan"
        );
        Ok((planned != count).then_some(planned))
    }

    /// Grow or shrink the shard count based on average shard file size
    ///
    /// Safe to call after every bulk insert; does nothing when sizes are
    /// within thresholds.
    pub async fn auto_rebalance(&mut self) -> ShardResult<Option<RebalanceReport>> {
        match self.plan_auto_rebalance().await? {
            Some(target) => Ok(Some(self.rebalance(target).await?)),
            None => Ok(None),
        }
    }

    /// Delete every shard and start over with one empty shard
    pub async fn reset(&mut self) -> ShardResult<()> {
        info!(target: "shardvault::shard", shards = self.shard_count, "Resetting shard store");

        for idx in 0..self.shard_count {
            self.delete_shard_file(idx).await?;
        }

        // nothing is written back, the files are gone
        self.cache.get_mut().clear();
        let _ = self.cache.get_mut().resize(self.options.cache_capacity);
        self.evicting.get_mut().clear();
        self.slots.get_mut().clear();

        self.shard_count = 1;
        self.ring = HashRing::with_nodes(1, self.options.replicas);

        let handle = self.create_shard(0).await?;
        self.admit(0, handle).await
    }

    /// Copy document `id` from shard `from` into shard `to`, then remove it
    /// from `from`
    async fn transfer(&self, id: &str, from: usize, to: usize) -> ShardResult<()> {
        let source = self.fetch_shard(from).await?;
        let doc = source
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::DocumentNotFound { id: id.to_string() })?;

        let dest = self.fetch_shard(to).await?;
        dest.write().upsert_many(vec![doc])?;
        source.write().remove(id);
        Ok(())
    }

    /// Undo a rebalance that failed before the new ring was installed
    ///
    /// `written` lists old shards already rewritten with moved contents;
    /// they are written again once the moves are reversed. The files of
    /// shards created for growth are deleted only when that succeeded,
    /// otherwise they may hold the only persisted copy of some documents.
    async fn roll_back(
        &mut self,
        from_count: usize,
        new_count: usize,
        moved: &[&MovedId],
        written: &[usize],
        capacity: usize,
    ) {
        warn!(
            target: "shardvault::rebalance",
            from = from_count,
            to = new_count,
            moved = moved.len(),
            "Rebalance failed, rolling back"
        );

        for mv in moved.iter().rev() {
            if let Err(e) = self.transfer(&mv.id, mv.to, mv.from).await {
                warn!(
                    target: "shardvault::rebalance",
                    id = %mv.id,
                    shard = mv.from,
                    error = %e,
                    "Failed to return moved document"
                );
            }
        }

        let mut restored = true;
        for &idx in written.iter().filter(|idx| **idx < from_count) {
            let handle = self.cache.get_mut().peek(idx).cloned();
            let Some(handle) = handle else { continue };
            if let Err(e) = self.persist_shard(&handle, idx).await {
                restored = false;
                warn!(target: "shardvault::rebalance", shard = idx, error = %e, "Failed to restore shard file");
            }
        }

        if restored {
            for idx in from_count..new_count {
                if let Err(e) = self.delete_shard_file(idx).await {
                    warn!(target: "shardvault::rebalance", shard = idx, error = %e, "Failed to delete new shard file");
                }
            }
        } else if new_count > from_count {
            warn!(
                target: "shardvault::rebalance",
                from = from_count,
                to = new_count,
                "Keeping new shard files, restored shards are incomplete on disk"
            );
        }

        let cache = self.cache.get_mut();
        for idx in from_count..new_count {
            cache.remove(idx);
        }
        let released = cache.resize(capacity);
        for (idx, handle) in released {
            let dirty = handle.read().is_dirty();
            if dirty {
                if let Err(e) = self.persist_shard(&handle, idx).await {
                    warn!(target: "shardvault::rebalance", shard = idx, error = %e, "Failed to write back released shard");
                }
            }
        }
        self.slots.get_mut().retain(|idx, _| *idx < from_count);
    }
}
