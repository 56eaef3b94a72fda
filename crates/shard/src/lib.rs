//! Sharding layer for shardvault
//!
//! Documents are partitioned across independently persisted shards:
//! - **HashRing**: consistent hashing of document ids to shard indices
//! - **ShardCache**: LRU residency with write-back on eviction
//! - **ShardManager**: load/persist, rebalance, auto-rebalance, reset
//!
//! # Example
//!
//! ```ignore
//! let manager = ShardManager::open(fs, ".shardvault", schema, ManagerOptions::default()).await?;
//! let idx = manager.get_node(&doc.id)?;
//! let shard = manager.get_shard(idx).await?;
//! shard.write().upsert_many(vec![doc])?;
//! manager.persist_shard(&shard, idx).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod manager;
pub mod rebalance;
pub mod ring;

pub use cache::{ShardCache, DEFAULT_CACHE_CAPACITY};
pub use error::{ShardError, ShardResult};
pub use manager::{
    shard_file_name, AutoRebalanceConfig, ManagerOptions, ShardHandle, ShardManager, ShardStats,
};
pub use rebalance::RebalanceReport;
pub use ring::{ring_hash, HashRing, MovedId, RingError, DEFAULT_REPLICAS};
