//! Shard file serialization
//!
//! ## File Format (Version 0x01)
//!
//! ```text
//! [Magic: "SVSH"]
//! [Version: u8]
//! [Header Length: u32 LE]
//! [Header: MessagePack ShardFileHeader]
//! For each document (in id order):
//!   [Id Length: u32 LE]       [Id: UTF-8 bytes]
//!   [Content Length: u32 LE]  [Content: UTF-8 bytes]
//!   [Dimension: u32 LE]       [Embedding: dimension * f32 LE]
//!   [Metadata Length: u32 LE] [Metadata: JSON bytes]
//! ```
//!
//! The schema is deliberately absent from the file. A decoded shard is a bare
//! [`ShardData`] until [`ShardData::rehydrate`] injects the schema built from
//! the current configuration.

use crate::error::{IndexError, IndexResult};
use crate::index::{IndexedDocument, ShardIndex};
use crate::schema::ShardSchema;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use tracing::warn;

/// Leading bytes of every shard file
pub const SHARD_FILE_MAGIC: &[u8; 4] = b"SVSH";

/// Shard file format version
pub const SHARD_FORMAT_VERSION: u8 = 0x01;

/// Smallest encoded document: four length prefixes and empty payloads
const MIN_RECORD_LEN: usize = 16;

/// Shard file header (MessagePack serialized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardFileHeader {
    /// Number of documents that follow
    pub document_count: u32,
    /// Embedding width at write time, informational only
    pub dimension_hint: usize,
    /// Tokenizer language at write time
    pub language: String,
    /// Unix milliseconds
    pub written_at: i64,
}

/// Decoded shard contents, not yet bound to a schema
#[derive(Debug, Clone)]
pub struct ShardData {
    /// Header as read from the file
    pub header: ShardFileHeader,
    /// Documents in id order
    pub documents: Vec<IndexedDocument>,
}

impl ShardIndex {
    /// Serialize the index into the shard file format
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(64 + self.len() * (self.schema().dimension * 4 + 128));
        self.encode_into(&mut buf, shardvault_core::now_millis())?;
        Ok(buf)
    }

    fn encode_into<W: Write>(&self, writer: &mut W, written_at: i64) -> IndexResult<()> {
        writer.write_all(SHARD_FILE_MAGIC)?;
        writer.write_u8(SHARD_FORMAT_VERSION)?;

        let header = ShardFileHeader {
            document_count: self.len() as u32,
            dimension_hint: self.schema().dimension,
            language: self.schema().language.clone(),
            written_at,
        };
        let header_bytes =
            rmp_serde::to_vec(&header).map_err(|e| IndexError::Serialization(e.to_string()))?;
        writer.write_u32::<LittleEndian>(header_bytes.len() as u32)?;
        writer.write_all(&header_bytes)?;

        for doc in self.iter() {
            write_bytes(writer, doc.id.as_bytes())?;
            write_bytes(writer, doc.content.as_bytes())?;

            writer.write_u32::<LittleEndian>(doc.embedding.len() as u32)?;
            for &value in &doc.embedding {
                writer.write_f32::<LittleEndian>(value)?;
            }

            let meta_bytes = serde_json::to_vec(&doc.metadata)
                .map_err(|e| IndexError::Serialization(e.to_string()))?;
            write_bytes(writer, &meta_bytes)?;
        }

        Ok(())
    }
}

impl ShardData {
    /// Parse a shard file
    pub fn decode(bytes: &[u8]) -> IndexResult<Self> {
        let mut reader = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| IndexError::Corrupt("file too short for magic".to_string()))?;
        if &magic != SHARD_FILE_MAGIC {
            return Err(IndexError::Corrupt("bad magic".to_string()));
        }

        let version = reader.read_u8()?;
        if version != SHARD_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        let header_len = reader.read_u32::<LittleEndian>()? as usize;
        let header_bytes = read_exact_vec(&mut reader, header_len)?;
        let header: ShardFileHeader = rmp_serde::from_slice(&header_bytes)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        // counts come from the file, so allocations are bounded by what is left
        let count = header.document_count as usize;
        let mut documents = Vec::with_capacity(count.min(remaining(&reader) / MIN_RECORD_LEN));
        for _ in 0..count {
            let id = read_string(&mut reader)?;
            let content = read_string(&mut reader)?;

            let dimension = reader.read_u32::<LittleEndian>()? as usize;
            if dimension > remaining(&reader) / 4 {
                return Err(IndexError::Corrupt(format!(
                    "embedding of {dimension} floats exceeds remaining {} bytes",
                    remaining(&reader)
                )));
            }
            let mut embedding = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                embedding.push(reader.read_f32::<LittleEndian>()?);
            }

            let meta_len = reader.read_u32::<LittleEndian>()? as usize;
            let meta_bytes = read_exact_vec(&mut reader, meta_len)?;
            let metadata = serde_json::from_slice(&meta_bytes)
                .map_err(|e| IndexError::Serialization(e.to_string()))?;

            documents.push(IndexedDocument {
                id,
                content,
                embedding,
                metadata,
            });
        }

        if (reader.position() as usize) != bytes.len() {
            return Err(IndexError::Corrupt(format!(
                "{} trailing bytes after last document",
                bytes.len() - reader.position() as usize
            )));
        }

        Ok(ShardData { header, documents })
    }

    /// Bind the decoded documents to `schema`
    ///
    /// The schema is taken from the caller, never from the file. A language
    /// mismatch is logged and otherwise ignored.
    pub fn rehydrate(self, schema: ShardSchema) -> IndexResult<ShardIndex> {
        if self.header.language != schema.language {
            warn!(
                target: "shardvault::index",
                file_language = %self.header.language,
                language = %schema.language,
                "Shard written with a different language, using configured one"
            );
        }

        let mut docs = BTreeMap::new();
        for doc in self.documents {
            let id = doc.id.clone();
            if docs.insert(id.clone(), doc).is_some() {
                return Err(IndexError::Corrupt(format!("duplicate id in shard file: {id}")));
            }
        }
        Ok(ShardIndex::from_parts(schema, docs))
    }
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> IndexResult<()> {
    writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn remaining(reader: &Cursor<&[u8]>) -> usize {
    reader.get_ref().len().saturating_sub(reader.position() as usize)
}

fn read_exact_vec(reader: &mut Cursor<&[u8]>, len: usize) -> IndexResult<Vec<u8>> {
    let remaining = remaining(reader);
    if len > remaining {
        return Err(IndexError::Corrupt(format!(
            "length {len} exceeds remaining {remaining} bytes"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(reader: &mut Cursor<&[u8]>) -> IndexResult<String> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let bytes = read_exact_vec(reader, len)?;
    String::from_utf8(bytes).map_err(|e| IndexError::Corrupt(e.to_string()))
}
