use bytes::Bytes;
use serde::Serialize;

use crate::TransferError;

// ---------------------------------------------------------------------------
// ChunkDescriptor
// ---------------------------------------------------------------------------

/// Position of one chunk within a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDescriptor {
    /// 0-based chunk index.
    pub index: usize,
    /// Byte offset within the payload.
    pub offset: usize,
    /// Length of this chunk in bytes.
    pub length: usize,
}

impl ChunkDescriptor {
    /// 1-based chunk number, as sent on the wire.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Returns this chunk's bytes from `payload` without copying.
    ///
    /// Fails if the payload is shorter than the descriptor expects.
    pub fn slice(&self, payload: &Bytes) -> Result<Bytes, TransferError> {
        if self.end() > payload.len() {
            return Err(TransferError::ChunkOutOfRange {
                index: self.index,
                total: payload.len(),
            });
        }
        Ok(payload.slice(self.offset..self.end()))
    }
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Fixed partition of a payload of `file_len` bytes into `chunk_size` slices.
///
/// The plan is a pure function of `(file_len, chunk_size)`: descriptors are
/// contiguous, never overlap and cover exactly `[0, file_len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_len: usize,
    chunk_size: usize,
    total_chunks: usize,
}

impl ChunkPlan {
    /// Builds a plan. `chunk_size` must be positive.
    pub fn new(file_len: usize, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            file_len,
            chunk_size,
            total_chunks: file_len.div_ceil(chunk_size),
        })
    }

    /// Total payload length in bytes.
    pub fn file_len(&self) -> usize {
        self.file_len
    }

    /// Configured chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks, `ceil(file_len / chunk_size)`.
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Returns the descriptor for chunk `index`, or `None` past the end.
    pub fn descriptor(&self, index: usize) -> Option<ChunkDescriptor> {
        if index >= self.total_chunks {
            return None;
        }
        let offset = index * self.chunk_size;
        let length = std::cmp::min(self.chunk_size, self.file_len - offset);
        Some(ChunkDescriptor {
            index,
            offset,
            length,
        })
    }

    /// Iterates over every descriptor in ascending order.
    pub fn descriptors(&self) -> impl Iterator<Item = ChunkDescriptor> + '_ {
        (0..self.total_chunks).filter_map(|i| self.descriptor(i))
    }
}

/// Splits a payload length into chunk descriptors.
pub fn split_chunks(
    file_len: usize,
    chunk_size: usize,
) -> Result<Vec<ChunkDescriptor>, TransferError> {
    Ok(ChunkPlan::new(file_len, chunk_size)?.descriptors().collect())
}
