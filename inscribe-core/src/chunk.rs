//! Chunk types and chunk-set diffing
//!
//! Chunks are the unit of transfer for inscriptions. Each chunk is addressed
//! by its index and the byte offset it occupies in the target account. Chunk
//! sets are recomputed fresh for every comparison pass and never mutated.

use crate::error::{InscribeError, Result};
use bytes::Bytes;
use std::fmt;

/// A fixed-size slice of a payload, addressed by index and byte offset
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the chunk set
    pub index: usize,

    /// Byte offset in the target account (`index * chunk_size`)
    pub offset: usize,

    /// Raw chunk data, at most `chunk_size` bytes
    pub data: Bytes,
}

impl Chunk {
    /// Get the chunk size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte offset one past the last byte of this chunk
    pub fn end(&self) -> usize {
        self.offset + self.data.len()
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("index", &self.index)
            .field("offset", &self.offset)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Ordered, offset-indexed chunks derived from one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSet {
    chunk_size: usize,
    chunks: Vec<Chunk>,
}

impl ChunkSet {
    /// Split a buffer into `chunk_size` chunks. The last chunk may be shorter.
    pub fn split(data: impl Into<Bytes>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(InscribeError::Configuration(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        let data: Bytes = data.into();
        let chunks = (0..data.len())
            .step_by(chunk_size)
            .enumerate()
            .map(|(index, offset)| {
                let end = (offset + chunk_size).min(data.len());
                Chunk {
                    index,
                    offset,
                    data: data.slice(offset..end),
                }
            })
            .collect();

        Ok(Self { chunk_size, chunks })
    }

    /// Chunks whose data differs from the same index in `actual`.
    ///
    /// Indices missing from `actual` count as differing. The returned chunks
    /// carry this set's data, never `actual`'s.
    pub fn diff(&self, actual: &ChunkSet) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| {
                actual
                    .chunks
                    .get(chunk.index)
                    .map_or(true, |other| other.data != chunk.data)
            })
            .cloned()
            .collect()
    }

    /// Chunks whose byte range in `account` is missing or holds other bytes.
    ///
    /// Any range reaching past the end of `account` is pending. Bytes beyond
    /// the payload length are ignored.
    pub fn diff_against(&self, account: &[u8]) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| {
                account
                    .get(chunk.offset..chunk.end())
                    .map_or(true, |current| current != chunk.data.as_ref())
            })
            .cloned()
            .collect()
    }

    /// Concatenate all chunk data back into one buffer
    pub fn reassemble(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.total_bytes());
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.data);
        }
        Bytes::from(out)
    }

    /// Chunk size this set was split with
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total payload bytes across all chunks
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the set has no chunks (empty payload)
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Look up a chunk by index
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Iterate over the chunks in index order
    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }
}

impl<'a> IntoIterator for &'a ChunkSet {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
