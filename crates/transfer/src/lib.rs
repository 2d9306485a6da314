//! Chunk planning, payload types and progress math for sealed uploads.
//!
//! Everything here is transport- and crypto-agnostic: the splitter turns a
//! payload length into contiguous chunk descriptors, [`ProgressGate`]
//! keeps the reported percentage monotonic, and [`FileTypeValidator`]
//! decides whether a file may enter the pipeline at all.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{ChunkDescriptor, ChunkPlan, split_chunks};
pub use progress::{ProgressGate, overall_percent};
pub use types::{ChunkPayload, FileUpload, SessionStatus};
pub use validation::{FileTypeValidator, guess_mime_type};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("chunk {index} out of range (total {total})")]
    ChunkOutOfRange { index: usize, total: usize },
}
