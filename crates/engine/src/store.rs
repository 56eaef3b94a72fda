//! Vector store facade
//!
//! Wires an [`Embeddings`] provider to a [`DocumentRepository`]: text goes
//! in, gets embedded in one batch, is routed and persisted, and the shard
//! count is optionally adjusted afterwards.

use crate::config::StoreConfig;
use crate::embeddings::Embeddings;
use crate::repository::{DocumentRepository, SaveSummary, ScoredDocument, SearchOptions};
use shardvault_core::{Document, NewDocument, VaultError, VaultResult};
use shardvault_index::ShardSchema;
use shardvault_shard::{RebalanceReport, ShardManager, ShardStats};
use shardvault_storage::FileAdapter;
use std::sync::Arc;
use tracing::{info, warn};

const DIMENSION_PROBE: &str = "dimension probe";

/// Semantic store over sharded document indices
pub struct VectorStore {
    embeddings: Arc<dyn Embeddings>,
    repository: DocumentRepository,
    auto_rebalance: bool,
    dimension: usize,
}

impl VectorStore {
    /// Open the store described by `config` on top of `fs`
    ///
    /// The embedding width is taken from one probe embedding, so the
    /// provider must be reachable at open time.
    pub async fn open(
        fs: Arc<dyn FileAdapter>,
        embeddings: Arc<dyn Embeddings>,
        config: &StoreConfig,
    ) -> VaultResult<Self> {
        config.validate()?;
        let probe = embeddings.embed_query(DIMENSION_PROBE).await?;
        if probe.is_empty() {
            return Err(VaultError::Embedding(format!(
                "model '{}' returned an empty embedding",
                embeddings.model_name()
            )));
        }
        let dimension = probe.len();
        let schema = ShardSchema::for_documents(dimension, config.metric, config.language.clone());
        let manager = ShardManager::open(fs, config.dir.clone(), schema, config.manager_options()).await?;
        info!(
            target: "shardvault::store",
            dir = %config.dir.display(),
            dimension,
            shards = manager.shard_count(),
            model = embeddings.model_name(),
            "Opened vector store"
        );

        Ok(VectorStore {
            embeddings,
            repository: DocumentRepository::new(manager)
                .with_similarity_threshold(config.similarity_threshold),
            auto_rebalance: config.auto_rebalance,
            dimension,
        })
    }

    /// Embedding width of this store
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Underlying repository
    pub fn repository(&self) -> &DocumentRepository {
        &self.repository
    }

    /// Embed and save a batch of chunks, returning their ids in input order
    ///
    /// Any failure is reported as [`VaultError::Reindex`]: some shards may
    /// already hold part of the batch, and re-running the same batch is
    /// safe because ids are content hashes.
    pub async fn add_documents(&self, documents: Vec<NewDocument>) -> VaultResult<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self
            .embeddings
            .embed_documents(&texts)
            .await
            .map_err(VaultError::into_reindex)?;
        if vectors.len() != documents.len() {
            return Err(VaultError::Embedding(format!(
                "expected {} embeddings, got {}",
                documents.len(),
                vectors.len()
            ))
            .into_reindex());
        }

        let model = self.embeddings.model_name().to_string();
        let prepared: Vec<Document> = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, embedding)| {
                let mut metadata = doc.metadata;
                metadata.embedding_model = model.clone();
                Document::new(doc.content, embedding, metadata)
            })
            .collect();
        let ids: Vec<String> = prepared.iter().map(|d| d.id.clone()).collect();

        let summary: SaveSummary = self
            .repository
            .save_many(prepared)
            .await
            .map_err(VaultError::into_reindex)?;
        info!(
            target: "shardvault::store",
            documents = ids.len(),
            inserted = summary.inserted,
            updated = summary.updated,
            "Added documents"
        );

        if self.auto_rebalance {
            match self.repository.auto_rebalance().await {
                Ok(Some(report)) => info!(
                    target: "shardvault::store",
                    from = report.from_count,
                    to = report.to_count,
                    moved = report.moved,
                    "Auto-rebalanced after add"
                ),
                Ok(None) => {}
                // documents are saved; a failed rebalance leaves the old layout intact
                Err(e) => warn!(target: "shardvault::store", error = %e, "Auto-rebalance failed"),
            }
        }
        Ok(ids)
    }

    /// Embed `query` and return the best matches
    pub async fn similarity_search(&self, query: &str, options: &SearchOptions) -> VaultResult<Vec<ScoredDocument>> {
        let vector = self.embeddings.embed_query(query).await?;
        self.similarity_search_by_vector(&vector, options).await
    }

    /// Search with a precomputed query vector
    pub async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        options: &SearchOptions,
    ) -> VaultResult<Vec<ScoredDocument>> {
        self.repository.search(vector, options).await
    }

    /// Fetch a document by id
    pub async fn get_document(&self, id: &str) -> VaultResult<Document> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| VaultError::DocumentNotFound { id: id.to_string() })
    }

    /// Redistribute documents over `shards` shards
    pub async fn rebalance(&self, shards: usize) -> VaultResult<RebalanceReport> {
        self.repository.rebalance(shards).await
    }

    /// Delete all shards and start over empty
    pub async fn reset(&self) -> VaultResult<()> {
        self.repository.reset().await
    }

    /// Per-shard statistics
    pub async fn stats(&self) -> VaultResult<Vec<ShardStats>> {
        self.repository.stats().await
    }

    /// Persist and release every resident shard
    pub async fn flush(&self) -> VaultResult<()> {
        self.repository.flush().await
    }
}
