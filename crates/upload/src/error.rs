//! Upload error types.

use dropseal_crypto::CryptoError;
use dropseal_transfer::TransferError;

use crate::compression::CompressionError;
use crate::transport::TransportError;

/// Errors produced by the upload pipeline.
///
/// Only `Validation`, `Compression` and `MaxRetriesExceeded` ever reach the
/// caller's error callback. `Encryption` and `Transport` describe a single
/// failed chunk attempt and are retried inside the session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid file type: {mime_type} ({name})")]
    Validation { name: String, mime_type: String },

    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("encryption error: {0}")]
    Encryption(#[from] CryptoError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(
        "max retries exceeded: chunk {chunk}/{total_chunks} failed after {attempts} attempts: {last_error}"
    )]
    MaxRetriesExceeded {
        chunk: usize,
        total_chunks: usize,
        attempts: u32,
        last_error: String,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session not active: {0}")]
    SessionNotActive(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// `true` for the one error that moves a session to `Failed`.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, UploadError::MaxRetriesExceeded { .. })
    }
}
