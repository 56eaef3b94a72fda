//! Document types
//!
//! A [`Document`] is one embedded chunk of a note. Its id is the SHA-256 of
//! its content, so re-ingesting unchanged text lands on the same id and
//! updates in place, while edited text produces a new id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata carried alongside every document
///
/// Field names are part of the filter surface: a [`crate::MetadataFilter`]
/// addresses these by their serialized names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Note title
    #[serde(default)]
    pub title: String,
    /// Vault-relative path of the source note
    #[serde(default)]
    pub path: String,
    /// Tags attached to the note
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source file extension without the dot (e.g. "md")
    #[serde(default)]
    pub extension: String,
    /// Creation time, Unix milliseconds
    #[serde(default)]
    pub created_at: i64,
    /// Last modification time, Unix milliseconds
    #[serde(default)]
    pub modified_at: i64,
    /// Name of the model that produced the embedding
    #[serde(default)]
    pub embedding_model: String,
}

impl DocumentMetadata {
    /// Metadata for a note at `path`, title and extension derived from it
    pub fn for_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        let (title, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
            _ => (file_name.to_string(), String::new()),
        };
        let now = now_millis();
        DocumentMetadata {
            title,
            path,
            tags: Vec::new(),
            extension,
            created_at: now,
            modified_at: now,
            embedding_model: String::new(),
        }
    }

    /// Builder: replace the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A fully prepared document, ready to be routed to a shard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (content hash)
    pub id: String,
    /// Chunk text
    pub content: String,
    /// Embedding vector; width must match the shard schema
    pub embedding: Vec<f32>,
    /// Note metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Build a document whose id is derived from its content
    pub fn new(content: impl Into<String>, embedding: Vec<f32>, metadata: DocumentMetadata) -> Self {
        let content = content.into();
        Document {
            id: content_id(&content),
            content,
            embedding,
            metadata,
        }
    }

    /// Build a document with an explicit id
    pub fn with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: DocumentMetadata,
    ) -> Self {
        Document {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata,
        }
    }
}

/// Text and metadata handed over by the chunking collaborator, not yet embedded
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    /// Chunk text
    pub content: String,
    /// Note metadata
    pub metadata: DocumentMetadata,
}

impl NewDocument {
    /// Create a new un-embedded document
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        NewDocument {
            content: content.into(),
            metadata,
        }
    }
}

/// Lowercase hex SHA-256 of `content`
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
