//! Optional pre-chunking compression hook.
//!
//! The engine does not ship an image codec. Callers that want files
//! shrunk before upload plug in a [`Compressor`]; a failure there is
//! reported and the original file is uploaded unchanged.

use std::future::Future;
use std::pin::Pin;

use dropseal_transfer::FileUpload;
use serde::{Deserialize, Serialize};

/// Limits passed to the compressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionOptions {
    /// Target maximum output size in MiB.
    pub max_size_mb: f64,
    /// Maximum width or height for images, in pixels.
    pub max_dimension: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_size_mb: 1.0,
            max_dimension: 1920,
        }
    }
}

/// Compression failure. Never fatal to the upload.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CompressionError(pub String);

/// Rewrites a file before it is chunked.
pub trait Compressor: Send + Sync {
    fn compress<'a>(
        &'a self,
        file: &'a FileUpload,
        options: CompressionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<FileUpload, CompressionError>> + Send + 'a>>;
}
