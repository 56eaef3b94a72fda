//! Document repository and vector store for shardvault
//!
//! - **DocumentRepository**: batched upserts routed by the hash ring and
//!   scatter-gather search over every shard
//! - **VectorStore**: embeds text through an [`Embeddings`] provider and
//!   stores it via the repository
//! - **StoreConfig**: `shardvault.toml` settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod embeddings;
pub mod repository;
pub mod store;

pub use config::{RebalanceConfig, StoreConfig, CONFIG_FILE_NAME, DEFAULT_SIMILARITY_THRESHOLD};
pub use embeddings::Embeddings;
pub use repository::{
    merge_hits, DocumentRepository, SaveSummary, ScoredDocument, SearchOptions, SearchType, DEFAULT_K,
};
pub use store::VectorStore;
