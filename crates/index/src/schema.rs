//! Shard schema
//!
//! The schema is authoritative configuration, never data: it is rebuilt from
//! the current embedding model on every open and injected into each shard
//! after it is decoded (see [`crate::ShardData::rehydrate`]).

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use shardvault_core::{DistanceMetric, MetadataFilter};
use std::collections::BTreeMap;

/// Language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "english";

/// Type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Array of strings
    StringArray,
    /// Number (timestamps are stored as numbers)
    Number,
    /// Fixed-width f32 vector
    Vector(usize),
}

impl FieldType {
    fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::StringArray)
    }
}

/// Document layout of one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSchema {
    /// Metadata fields addressable by filters
    pub fields: BTreeMap<String, FieldType>,
    /// Embedding field width
    pub dimension: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Tokenizer language the shard is built for
    pub language: String,
}

impl ShardSchema {
    /// Schema for vault documents with embeddings of width `dimension`
    pub fn for_documents(dimension: usize, metric: DistanceMetric, language: impl Into<String>) -> Self {
        let fields = [
            ("title", FieldType::String),
            ("path", FieldType::String),
            ("tags", FieldType::StringArray),
            ("extension", FieldType::String),
            ("created_at", FieldType::Number),
            ("modified_at", FieldType::Number),
            ("embedding_model", FieldType::String),
        ]
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect();

        ShardSchema {
            fields,
            dimension,
            metric,
            language: language.into(),
        }
    }

    /// Type of the embedding field
    pub fn vector_field(&self) -> FieldType {
        FieldType::Vector(self.dimension)
    }

    /// Reject vectors whose width differs from the schema
    pub fn validate_embedding(&self, embedding: &[f32]) -> IndexResult<()> {
        if embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        Ok(())
    }

    /// Reject filters on unknown fields, and substring conditions on
    /// non-textual fields
    pub fn validate_filter(&self, filter: &MetadataFilter) -> IndexResult<()> {
        for field in filter.fields() {
            if !self.fields.contains_key(field) {
                return Err(IndexError::InvalidFilter {
                    field: field.to_string(),
                    reason: "unknown field".to_string(),
                });
            }
        }
        for field in filter.contains.keys() {
            let textual = self.fields.get(field).is_some_and(FieldType::is_textual);
            if !textual {
                return Err(IndexError::InvalidFilter {
                    field: field.clone(),
                    reason: "substring condition on a non-text field".to_string(),
                });
            }
        }
        Ok(())
    }
}
