//! Embedding provider capability
//!
//! The store never picks a model. It asks the provider for vectors and
//! derives the shard schema width from one probe embedding at open time.
//! Switching providers without a reset surfaces as a dimension mismatch on
//! the next insert.

use async_trait::async_trait;
use shardvault_core::VaultResult;

/// Text embedding provider
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> VaultResult<Vec<f32>>;

    /// Embed a batch of document chunks, one vector per input, same order
    async fn embed_documents(&self, texts: &[String]) -> VaultResult<Vec<Vec<f32>>>;

    /// Model name recorded in document metadata
    fn model_name(&self) -> &str;
}
