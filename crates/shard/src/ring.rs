//! Consistent hash ring
//!
//! Maps document ids to shard indices. Each shard contributes `replicas`
//! virtual nodes placed at `hash("{index}:{replica}")`; a key belongs to the
//! first virtual node clockwise from its own hash.
//!
//! Node ids are shard indices, so routing is a binary search over a sorted
//! `Vec` with no string parsing on the hot path.

use std::collections::BTreeSet;
use thiserror::Error;

/// Virtual nodes per shard when none is configured
pub const DEFAULT_REPLICAS: usize = 100;

/// Errors raised by ring lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// Lookup on a ring without nodes
    #[error("Hash ring is empty")]
    Empty,
}

/// A document whose owning shard differs between two ring layouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedId {
    /// Document id
    pub id: String,
    /// Owner on the current ring
    pub from: usize,
    /// Owner on the target ring
    pub to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct VirtualNode {
    hash: u32,
    node: usize,
}

/// Consistent hash ring over shard indices
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Sorted by (hash, node); ties never depend on insertion order
    entries: Vec<VirtualNode>,
    nodes: BTreeSet<usize>,
    replicas: usize,
}

impl HashRing {
    /// Create an empty ring
    pub fn new(replicas: usize) -> Self {
        HashRing {
            entries: Vec::new(),
            nodes: BTreeSet::new(),
            replicas: replicas.max(1),
        }
    }

    /// Ring with nodes `0..count`
    pub fn with_nodes(count: usize, replicas: usize) -> Self {
        let mut ring = HashRing::new(replicas);
        for node in 0..count {
            ring.add_node(node);
        }
        ring
    }

    /// Register a node; no-op if already present
    pub fn add_node(&mut self, node: usize) {
        if !self.nodes.insert(node) {
            return;
        }
        self.entries.reserve(self.replicas);
        for replica in 0..self.replicas {
            let entry = VirtualNode {
                hash: ring_hash(&format!("{node}:{replica}")),
                node,
            };
            let pos = match self.entries.binary_search(&entry) {
                Ok(pos) | Err(pos) => pos,
            };
            self.entries.insert(pos, entry);
        }
    }

    /// Unregister a node; no-op if absent
    pub fn remove_node(&mut self, node: usize) {
        if self.nodes.remove(&node) {
            self.entries.retain(|e| e.node != node);
        }
    }

    /// Shard owning `key`
    pub fn get_node(&self, key: &str) -> Result<usize, RingError> {
        if self.entries.is_empty() {
            return Err(RingError::Empty);
        }
        let hash = ring_hash(key);
        let pos = self.entries.partition_point(|e| e.hash < hash);
        let entry = self.entries.get(pos).unwrap_or(&self.entries[0]);
        Ok(entry.node)
    }

    /// Ids whose owner changes when moving to a ring with nodes
    /// `0..new_node_count`
    ///
    /// The target ring is rebuilt from scratch. Virtual node placement is
    /// not linear in the node count, so nothing about the current layout
    /// carries over.
    pub fn diff_moved_ids<'a, I>(&self, new_node_count: usize, ids: I) -> Result<Vec<MovedId>, RingError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let target = HashRing::with_nodes(new_node_count, self.replicas);
        let mut moved = Vec::new();
        for id in ids {
            let from = self.get_node(id)?;
            let to = target.get_node(id)?;
            if from != to {
                moved.push(MovedId {
                    id: id.to_string(),
                    from,
                    to,
                });
            }
        }
        Ok(moved)
    }

    /// Registered nodes in ascending order
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().copied()
    }

    /// Check if a node is registered
    pub fn contains_node(&self, node: usize) -> bool {
        self.nodes.contains(&node)
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no node is registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of virtual nodes on the ring
    pub fn virtual_node_count(&self) -> usize {
        self.entries.len()
    }

    /// Virtual nodes per registered node
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

/// 32-bit FNV-1a with a murmur3 finalizer
///
/// FNV alone clusters similar short keys like "3:17" and "3:18"; the
/// finalizer spreads them across the whole range.
pub fn ring_hash(key: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    fmix32(hash)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
