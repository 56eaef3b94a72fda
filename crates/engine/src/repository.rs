//! Document repository: routing writes and scatter-gather search
//!
//! # Search
//!
//! Every shard runs the same query with limit `fetch_k.unwrap_or(k)`. The
//! per-shard hit lists are concatenated, sorted by score (ties by id) and
//! truncated to `k`. For similarity search the merged list is the exact
//! global top-`k`. MMR selects within each shard, so results are diverse
//! per shard but not across shards; a larger `fetch_k` widens each shard's
//! candidate pool.
//!
//! # Locking
//!
//! The manager sits behind a `tokio::sync::RwLock`. Searches and lookups
//! share it; batched saves and topology changes take it exclusively.

use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use futures::future::try_join_all;
use shardvault_core::{Document, MetadataFilter, VaultError, VaultResult};
use shardvault_index::{IndexedDocument, MmrParams, SearchHit, SearchParams, UpsertOutcome};
use shardvault_shard::{RebalanceReport, ShardError, ShardManager, ShardStats};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Number of results when a caller does not choose
pub const DEFAULT_K: usize = 4;

/// Retrieval mode, passed through to every shard
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SearchType {
    /// Plain similarity ranking
    #[default]
    Similarity,
    /// Max marginal relevance; `diversity` 1.0 = pure relevance
    Mmr {
        /// Relevance/diversity trade-off in `[0, 1]`
        diversity: f32,
    },
}

/// Search parameters
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of results
    pub k: usize,
    /// Per-shard candidate count, `k` when unset
    pub fetch_k: Option<usize>,
    /// Metadata filter applied inside every shard
    pub filter: MetadataFilter,
    /// Minimum similarity, the repository default when unset
    pub lambda: Option<f32>,
    /// Retrieval mode
    pub search_type: SearchType,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions::new(DEFAULT_K)
    }
}

impl SearchOptions {
    /// Plain similarity search for `k` results
    pub fn new(k: usize) -> Self {
        SearchOptions {
            k,
            fetch_k: None,
            filter: MetadataFilter::new(),
            lambda: None,
            search_type: SearchType::Similarity,
        }
    }

    /// Builder: per-shard candidate count
    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = Some(fetch_k);
        self
    }

    /// Builder: metadata filter
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Builder: similarity threshold
    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = Some(lambda);
        self
    }

    /// Builder: max marginal relevance mode
    pub fn mmr(mut self, diversity: f32) -> Self {
        self.search_type = SearchType::Mmr { diversity };
        self
    }

    fn per_shard_limit(&self) -> usize {
        self.fetch_k.unwrap_or(self.k)
    }
}

/// A search result
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// Matched document
    pub document: Document,
    /// Similarity to the query
    pub score: f32,
}

/// Counts produced by [`DocumentRepository::save_many`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Documents new to their shard
    pub inserted: usize,
    /// Documents that replaced an existing id
    pub updated: usize,
    /// Shards written
    pub shards: usize,
}

/// Document-level API over the shard manager
pub struct DocumentRepository {
    manager: RwLock<ShardManager>,
    similarity_threshold: f32,
}

impl DocumentRepository {
    /// Wrap an opened shard manager
    pub fn new(manager: ShardManager) -> Self {
        DocumentRepository {
            manager: RwLock::new(manager),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Builder: default similarity threshold
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Default similarity threshold
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Upsert a batch of documents
    ///
    /// Documents are grouped by owning shard; each group is one batched
    /// upsert followed by one persist, and groups run concurrently. The call
    /// fails if any group fails. Upsert by id makes a retry of the whole
    /// batch safe.
    pub async fn save_many(&self, documents: Vec<Document>) -> VaultResult<SaveSummary> {
        if documents.iter().any(|d| d.id.is_empty()) {
            return Err(VaultError::MissingDocumentId);
        }
        if documents.is_empty() {
            return Ok(SaveSummary::default());
        }

        let manager = self.manager.write().await;
        let mut groups: BTreeMap<usize, Vec<IndexedDocument>> = BTreeMap::new();
        for doc in documents {
            let idx = manager.get_node(&doc.id)?;
            groups
                .entry(idx)
                .or_default()
                .push(IndexedDocument::from_document(doc)?);
        }

        let manager = &*manager;
        let tasks = groups.into_iter().map(|(idx, docs)| async move {
            let shard = manager.get_shard(idx).await?;
            let outcome = shard.write().upsert_many(docs)?;
            manager.persist_shard(&shard, idx).await?;
            debug!(
                target: "shardvault::repository",
                shard = idx,
                inserted = outcome.inserted,
                updated = outcome.updated,
                "Saved documents"
            );
            Ok::<UpsertOutcome, ShardError>(outcome)
        });
        let outcomes = try_join_all(tasks).await?;

        let summary = outcomes.iter().fold(
            SaveSummary {
                shards: outcomes.len(),
                ..SaveSummary::default()
            },
            |mut acc, o| {
                acc.inserted += o.inserted;
                acc.updated += o.updated;
                acc
            },
        );
        info!(
            target: "shardvault::repository",
            inserted = summary.inserted,
            updated = summary.updated,
            shards = summary.shards,
            "Saved batch"
        );
        Ok(summary)
    }

    /// Global top-`k` over every shard
    pub async fn search(&self, query: &[f32], options: &SearchOptions) -> VaultResult<Vec<ScoredDocument>> {
        if options.k == 0 {
            return Ok(Vec::new());
        }
        let threshold = options.lambda.unwrap_or(self.similarity_threshold);
        let limit = options.per_shard_limit();

        let manager = self.manager.read().await;
        let manager = &*manager;
        let tasks = (0..manager.shard_count()).map(|idx| async move {
            let shard = manager.get_shard(idx).await?;
            let shard = shard.read();
            let hits = match options.search_type {
                SearchType::Similarity => shard.search(
                    query,
                    &SearchParams {
                        limit,
                        filter: options.filter.clone(),
                        threshold,
                    },
                )?,
                SearchType::Mmr { diversity } => shard.search_mmr(
                    query,
                    &MmrParams {
                        k: options.k,
                        fetch_k: limit,
                        diversity,
                        filter: options.filter.clone(),
                        threshold,
                    },
                )?,
            };
            Ok::<Vec<SearchHit>, ShardError>(hits)
        });
        let per_shard = try_join_all(tasks).await?;

        let merged = merge_hits(per_shard, options.k);
        debug!(
            target: "shardvault::repository",
            k = options.k,
            limit,
            hits = merged.len(),
            "Search complete"
        );
        merged
            .into_iter()
            .map(|hit| -> VaultResult<ScoredDocument> {
                Ok(ScoredDocument {
                    document: hit.document.into_document()?,
                    score: hit.score,
                })
            })
            .collect()
    }

    /// Look a document up by id in the shard it routes to
    pub async fn get(&self, id: &str) -> VaultResult<Option<Document>> {
        let manager = self.manager.read().await;
        let idx = manager.get_node(id)?;
        let shard = manager.get_shard(idx).await?;
        let found = shard.read().get(id).cloned();
        Ok(found.map(IndexedDocument::into_document).transpose()?)
    }

    /// Total number of documents across shards
    pub async fn count(&self) -> VaultResult<usize> {
        let manager = self.manager.read().await;
        let mut total = 0;
        for idx in 0..manager.shard_count() {
            total += manager.get_shard(idx).await?.read().len();
        }
        Ok(total)
    }

    /// Current number of shards
    pub async fn shard_count(&self) -> usize {
        self.manager.read().await.shard_count()
    }

    /// Redistribute documents over `shards` shards
    pub async fn rebalance(&self, shards: usize) -> VaultResult<RebalanceReport> {
        Ok(self.manager.write().await.rebalance(shards).await?)
    }

    /// Rebalance if the average shard size is outside thresholds
    pub async fn auto_rebalance(&self) -> VaultResult<Option<RebalanceReport>> {
        Ok(self.manager.write().await.auto_rebalance().await?)
    }

    /// Delete everything and start over with one empty shard
    pub async fn reset(&self) -> VaultResult<()> {
        Ok(self.manager.write().await.reset().await?)
    }

    /// Per-shard statistics
    pub async fn stats(&self) -> VaultResult<Vec<ShardStats>> {
        Ok(self.manager.read().await.stats().await?)
    }

    /// Persist and release every resident shard
    pub async fn flush(&self) -> VaultResult<()> {
        Ok(self.manager.write().await.flush().await?)
    }
}

/// Concatenate per-shard hits, order by (score desc, id asc), keep `k`
pub fn merge_hits(per_shard: Vec<Vec<SearchHit>>, k: usize) -> Vec<SearchHit> {
    let mut all: Vec<SearchHit> = per_shard.into_iter().flatten().collect();
    all.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    all.truncate(k);
    all
}
