//! Shared helpers for the vault scenario suite.

#![allow(dead_code)]

use async_trait::async_trait;
use shardvault::{
    DistanceMetric, DocumentMetadata, Embeddings, FileAdapter, LocalFileAdapter, MemoryFileAdapter,
    NewDocument, StoreConfig, VaultResult, VectorStore,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Embedding width used by [`LcgEmbeddings`]
pub const DIMENSION: usize = 8;

/// Fixed seed for reproducible vectors
const SEED: u64 = 0x5EED_CAFE_F00D_0001;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state
}

/// Deterministic pseudo-random vector in `[-1, 1]^dimension`
pub fn seeded_vector(dimension: usize, seed: u64) -> Vec<f32> {
    let mut state = seed ^ SEED;
    (0..dimension)
        .map(|_| {
            let bits = lcg_next(&mut state) >> 40;
            (bits as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

fn text_seed(text: &str) -> u64 {
    text.bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

/// Embeds every text to a deterministic vector derived from its bytes
pub struct LcgEmbeddings;

#[async_trait]
impl Embeddings for LcgEmbeddings {
    async fn embed_query(&self, text: &str) -> VaultResult<Vec<f32>> {
        Ok(seeded_vector(DIMENSION, text_seed(text)))
    }

    async fn embed_documents(&self, texts: &[String]) -> VaultResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| seeded_vector(DIMENSION, text_seed(t))).collect())
    }

    fn model_name(&self) -> &str {
        "lcg-8"
    }
}

/// Expected embedding of `text` under [`LcgEmbeddings`]
pub fn embedding_of(text: &str) -> Vec<f32> {
    seeded_vector(DIMENSION, text_seed(text))
}

/// `n` chunks spread over a handful of notes, tagged by parity
pub fn chunks(n: usize) -> Vec<NewDocument> {
    (0..n)
        .map(|i| {
            let tag = if i % 2 == 0 { "even" } else { "odd" };
            NewDocument::new(
                format!("chunk {i} of note {}", i % 5),
                DocumentMetadata::for_path(format!("notes/note-{}.md", i % 5)).with_tags([tag]),
            )
        })
        .collect()
}

/// Config with auto-rebalance off so tests control the layout
pub fn manual_config() -> StoreConfig {
    StoreConfig {
        auto_rebalance: false,
        ..StoreConfig::default()
    }
}

/// Cosine similarity, matching the store's default metric
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    DistanceMetric::Cosine.similarity(a, b)
}

/// Store over an in-memory vault
pub async fn memory_store(config: &StoreConfig) -> VectorStore {
    let fs: Arc<dyn FileAdapter> = Arc::new(MemoryFileAdapter::new());
    VectorStore::open(fs, Arc::new(LcgEmbeddings), config)
        .await
        .expect("open memory store")
}

/// Vault on local disk, kept alive by the returned TempDir
pub struct DiskVault {
    pub root: TempDir,
}

impl DiskVault {
    pub fn new() -> Self {
        DiskVault {
            root: TempDir::new().expect("tempdir"),
        }
    }

    pub fn fs(&self) -> Arc<dyn FileAdapter> {
        Arc::new(LocalFileAdapter::new(self.root.path()))
    }

    pub async fn open(&self, config: &StoreConfig) -> VectorStore {
        VectorStore::open(self.fs(), Arc::new(LcgEmbeddings), config)
            .await
            .expect("open disk store")
    }

    /// Shard file names present on disk, sorted
    pub fn shard_files(&self, config: &StoreConfig) -> Vec<String> {
        let dir = self.root.path().join(&config.dir);
        let mut names: Vec<String> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with("vectorstore-") && !n.ends_with(".tmp"))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

/// File names a store with `count` shards should have, sorted like [`DiskVault::shard_files`]
pub fn expected_files(count: usize) -> Vec<String> {
    let mut names: Vec<String> = (0..count).map(shardvault::shard_file_name).collect();
    names.sort();
    names
}
