//! Shardvault - sharded vector store for personal knowledge bases
//!
//! Notes are chunked and embedded by the caller, then stored across
//! independently persisted shards. Document ids are routed to shards by a
//! consistent hash ring; searches fan out to every shard and the per-shard
//! results are merged into one ranking.
//!
//! # Quick Start
//!
//! ```ignore
//! use shardvault::{LocalFileAdapter, NewDocument, DocumentMetadata, SearchOptions, StoreConfig, VectorStore};
//!
//! let fs = Arc::new(LocalFileAdapter::new("/path/to/vault"));
//! let store = VectorStore::open(fs, embeddings, &StoreConfig::default()).await?;
//!
//! store.add_documents(vec![NewDocument::new("chunk text", DocumentMetadata::for_path("notes/a.md"))]).await?;
//! let hits = store.similarity_search("what did I write about a?", &SearchOptions::new(4)).await?;
//! ```
//!
//! # Architecture
//!
//! - `shardvault-core`: documents, filters, metrics, errors
//! - `shardvault-index`: one shard's document index and file format
//! - `shardvault-storage`: file adapter capability
//! - `shardvault-shard`: hash ring, shard cache, shard manager
//! - `shardvault-engine`: repository, vector store, configuration

pub use shardvault_core::{
    content_id, now_millis, DistanceMetric, Document, DocumentMetadata, JsonScalar, MetadataFilter,
    NewDocument, VaultError, VaultResult,
};
pub use shardvault_engine::{
    DocumentRepository, Embeddings, RebalanceConfig, SaveSummary, ScoredDocument, SearchOptions,
    SearchType, StoreConfig, VectorStore, CONFIG_FILE_NAME, DEFAULT_K, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use shardvault_index::{ShardIndex, ShardSchema};
pub use shardvault_shard::{
    shard_file_name, AutoRebalanceConfig, HashRing, ManagerOptions, RebalanceReport, ShardManager,
    ShardStats,
};
pub use shardvault_storage::{FileAdapter, FileStat, LocalFileAdapter, MemoryFileAdapter};
