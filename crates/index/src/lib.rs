//! Embedded document index for a single shard
//!
//! Each shard of the vault is one [`ShardIndex`]: an in-memory document
//! store keyed by id plus brute-force vector search over the embeddings.
//!
//! - **ShardSchema**: field layout, vector width, metric, language
//! - **ShardIndex**: insert/upsert/remove/lookup, similarity and MMR search
//! - **codec**: binary shard file format (encode, decode, rehydrate)
//! - **IndexError**: error type for index operations

pub mod codec;
pub mod error;
pub mod index;
pub mod schema;

pub use codec::{ShardData, ShardFileHeader, SHARD_FILE_MAGIC, SHARD_FORMAT_VERSION};
pub use error::{IndexError, IndexResult};
pub use index::{IndexedDocument, MmrParams, SearchHit, SearchParams, ShardIndex, UpsertOutcome};
pub use schema::{FieldType, ShardSchema, DEFAULT_LANGUAGE};
