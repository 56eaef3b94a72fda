//! Core types for Shardvault
//!
//! This crate defines the foundational types shared by every layer:
//! - Document: content, embedding and metadata of one indexed chunk
//! - DocumentMetadata: title, path, tags, extension, timestamps, model
//! - MetadataFilter: conjunctive equality/substring filter
//! - DistanceMetric: similarity metric used by shard indexes
//! - VaultError: top-level error type every crate converts into

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod filter;
pub mod metric;

pub use document::{content_id, now_millis, Document, DocumentMetadata, NewDocument};
pub use error::{VaultError, VaultResult};
pub use filter::{JsonScalar, MetadataFilter};
pub use metric::DistanceMetric;
