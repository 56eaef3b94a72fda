//! In-memory document index of one shard
//!
//! Documents live in a BTreeMap keyed by id so iteration, search tie-breaks
//! and encoded output are deterministic. Search is brute force: every
//! document passing the filter is scored against the query.

use crate::error::{IndexError, IndexResult};
use crate::schema::ShardSchema;
use serde_json::Value as JsonValue;
use shardvault_core::{Document, MetadataFilter};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A document as stored in a shard
///
/// Metadata is kept as JSON so filters can address fields by name.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Stable document id
    pub id: String,
    /// Chunk text
    pub content: String,
    /// Embedding, width matches the schema
    pub embedding: Vec<f32>,
    /// Metadata object
    pub metadata: JsonValue,
}

impl IndexedDocument {
    /// Convert a vault document into its stored form
    pub fn from_document(doc: Document) -> IndexResult<Self> {
        let metadata = serde_json::to_value(&doc.metadata)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        Ok(IndexedDocument {
            id: doc.id,
            content: doc.content,
            embedding: doc.embedding,
            metadata,
        })
    }

    /// Convert back into a vault document
    pub fn into_document(self) -> IndexResult<Document> {
        let metadata = serde_json::from_value(self.metadata)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        Ok(Document {
            id: self.id,
            content: self.content,
            embedding: self.embedding,
            metadata,
        })
    }
}

/// One scored search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matched document
    pub document: IndexedDocument,
    /// Similarity to the query, higher = more similar
    pub score: f32,
}

/// Parameters of a similarity search
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Maximum number of hits
    pub limit: usize,
    /// Metadata filter
    pub filter: MetadataFilter,
    /// Hits scoring below this are dropped
    pub threshold: f32,
}

/// Parameters of a max-marginal-relevance search
#[derive(Debug, Clone)]
pub struct MmrParams {
    /// Number of hits to select
    pub k: usize,
    /// Candidate pool size
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity
    pub diversity: f32,
    /// Metadata filter
    pub filter: MetadataFilter,
    /// Candidates scoring below this are dropped
    pub threshold: f32,
}

/// Counts produced by a batched upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Ids that were new to the shard
    pub inserted: usize,
    /// Ids that already existed and were replaced
    pub updated: usize,
}

/// Document index of one shard
#[derive(Debug, Clone)]
pub struct ShardIndex {
    schema: ShardSchema,
    docs: BTreeMap<String, IndexedDocument>,
    /// Bumped by every mutation
    revision: u64,
    /// Highest revision known to be in the shard file
    persisted_revision: u64,
}

impl ShardIndex {
    /// Create an empty index
    pub fn new(schema: ShardSchema) -> Self {
        // never written, so dirty from the start
        ShardIndex {
            schema,
            docs: BTreeMap::new(),
            revision: 1,
            persisted_revision: 0,
        }
    }

    pub(crate) fn from_parts(schema: ShardSchema, docs: BTreeMap<String, IndexedDocument>) -> Self {
        ShardIndex {
            schema,
            docs,
            revision: 0,
            persisted_revision: 0,
        }
    }

    /// Schema in effect
    pub fn schema(&self) -> &ShardSchema {
        &self.schema
    }

    /// Replace the schema in place
    ///
    /// Stored documents are not revalidated; width mismatches surface on the
    /// next insert or search.
    pub fn set_schema(&mut self, schema: ShardSchema) {
        self.schema = schema;
        self.revision += 1;
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check for changes not yet written to the shard file
    pub fn is_dirty(&self) -> bool {
        self.revision > self.persisted_revision
    }

    /// Record that the state at `revision` reached the shard file
    ///
    /// A persist that finishes after a newer one never moves the mark back.
    pub fn mark_persisted(&mut self, revision: u64) {
        self.persisted_revision = self.persisted_revision.max(revision);
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Check if an id is present
    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Look up a document by id
    pub fn get(&self, id: &str) -> Option<&IndexedDocument> {
        self.docs.get(id)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> Vec<String> {
        self.docs.keys().cloned().collect()
    }

    /// Iterate documents in id order
    pub fn iter(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.docs.values()
    }

    /// Insert a document that must not exist yet
    pub fn insert(&mut self, doc: IndexedDocument) -> IndexResult<()> {
        self.validate_document(&doc)?;
        if self.docs.contains_key(&doc.id) {
            return Err(IndexError::DuplicateId { id: doc.id });
        }
        self.docs.insert(doc.id.clone(), doc);
        self.revision += 1;
        Ok(())
    }

    /// Insert or replace a batch of documents
    ///
    /// The whole batch is validated before anything is written, so a bad
    /// document leaves the index untouched.
    pub fn upsert_many(&mut self, docs: Vec<IndexedDocument>) -> IndexResult<UpsertOutcome> {
        for doc in &docs {
            self.validate_document(doc)?;
        }

        let mut outcome = UpsertOutcome::default();
        for doc in docs {
            if self.docs.insert(doc.id.clone(), doc).is_some() {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }
        if outcome.inserted + outcome.updated > 0 {
            self.revision += 1;
        }
        Ok(outcome)
    }

    /// Remove a document, returning it if it was present
    pub fn remove(&mut self, id: &str) -> Option<IndexedDocument> {
        let removed = self.docs.remove(id)?;
        self.revision += 1;
        Some(removed)
    }

    /// Top `limit` documents by similarity to `query`
    ///
    /// Results are sorted by (score desc, id asc).
    pub fn search(&self, query: &[f32], params: &SearchParams) -> IndexResult<Vec<SearchHit>> {
        let mut scored = self.score_candidates(query, &params.filter, params.threshold)?;
        scored.truncate(params.limit);
        Ok(scored
            .into_iter()
            .map(|(doc, score)| SearchHit {
                document: doc.clone(),
                score,
            })
            .collect())
    }

    /// Max-marginal-relevance selection over the `fetch_k` best candidates
    ///
    /// Each hit keeps its query similarity as score so hits from different
    /// shards can still be merged by relevance.
    pub fn search_mmr(&self, query: &[f32], params: &MmrParams) -> IndexResult<Vec<SearchHit>> {
        let mut candidates = self.score_candidates(query, &params.filter, params.threshold)?;
        candidates.truncate(params.fetch_k.max(params.k));

        let metric = self.schema.metric;
        let lambda = params.diversity.clamp(0.0, 1.0);
        let mut selected: Vec<(&IndexedDocument, f32)> = Vec::with_capacity(params.k);

        while selected.len() < params.k && !candidates.is_empty() {
            let mut best_idx = 0;
            let mut best_value = f32::NEG_INFINITY;
            for (idx, (doc, relevance)) in candidates.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|(chosen, _)| metric.similarity(&doc.embedding, &chosen.embedding))
                    .fold(f32::NEG_INFINITY, f32::max);
                let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
                let value = lambda * relevance - (1.0 - lambda) * redundancy;
                // strict > keeps the earlier (better ranked) candidate on ties
                if value > best_value {
                    best_value = value;
                    best_idx = idx;
                }
            }
            selected.push(candidates.remove(best_idx));
        }

        Ok(selected
            .into_iter()
            .map(|(doc, score)| SearchHit {
                document: doc.clone(),
                score,
            })
            .collect())
    }

    fn score_candidates(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        threshold: f32,
    ) -> IndexResult<Vec<(&IndexedDocument, f32)>> {
        self.schema.validate_embedding(query)?;
        self.schema.validate_filter(filter)?;

        let metric = self.schema.metric;
        let mut scored: Vec<(&IndexedDocument, f32)> = self
            .docs
            .values()
            .filter(|doc| doc.embedding.len() == query.len())
            .filter(|doc| filter.matches(&doc.metadata))
            .map(|doc| (doc, metric.similarity(query, &doc.embedding)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|(doc_a, score_a), (doc_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| doc_a.id.cmp(&doc_b.id))
        });
        Ok(scored)
    }

    fn validate_document(&self, doc: &IndexedDocument) -> IndexResult<()> {
        if doc.id.is_empty() {
            return Err(IndexError::MissingId);
        }
        self.schema.validate_embedding(&doc.embedding)
    }
}
