//! Uploader configuration.
//!
//! `UploaderConfig` is plain data and can be loaded from a JSON file
//! (camelCase keys, every field optional). Observer hooks are code, not
//! data, so they live in [`UploadCallbacks`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dropseal_crypto::Armor;
use dropseal_transfer::{DEFAULT_CHUNK_SIZE, FileTypeValidator};
use serde::{Deserialize, Serialize};

use crate::compression::CompressionOptions;
use crate::error::UploadError;

/// Default retries per chunk after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay before retrying a failed chunk.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Settings shared by every session a controller starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    /// URL chunks are POSTed to.
    pub endpoint: String,
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Retries per chunk; a chunk gets at most `max_retries + 1` attempts.
    pub max_retries: u32,
    /// Fixed backoff between attempts of the same chunk.
    pub retry_backoff_ms: u64,
    /// Allowed MIME types. Empty allows everything.
    pub allowed_types: Vec<String>,
    /// Limits handed to the compressor, if one is installed.
    pub compression: CompressionOptions,
    /// Wire encoding of sealed chunks.
    pub armor: Armor,
    /// Per-request timeout for the HTTP transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            allowed_types: Vec::new(),
            compression: CompressionOptions::default(),
            armor: Armor::default(),
            request_timeout_secs: None,
        }
    }
}

impl UploaderConfig {
    /// Default config targeting `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Loads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), endpoint = %config.endpoint, "config loaded");
        Ok(config)
    }

    /// Parses and validates a JSON config string.
    pub fn from_json(json: &str) -> Result<Self, UploadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.endpoint.trim().is_empty() {
            return Err(UploadError::Config("endpoint is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::Config("chunkSize must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn validator(&self) -> FileTypeValidator {
        FileTypeValidator::new(&self.allowed_types)
    }
}

/// Progress hook: overall percentage in `0.0..=100.0`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Success hook: human-readable message.
pub type SuccessCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Error hook: the error that ended (or was reported by) the upload.
pub type ErrorCallback = Arc<dyn Fn(&UploadError) + Send + Sync>;

/// Observer hooks. Each defaults to a no-op.
#[derive(Clone)]
pub struct UploadCallbacks {
    pub on_progress: ProgressCallback,
    pub on_success: SuccessCallback,
    pub on_error: ErrorCallback,
}

impl Default for UploadCallbacks {
    fn default() -> Self {
        Self {
            on_progress: Arc::new(|_| {}),
            on_success: Arc::new(|_| {}),
            on_error: Arc::new(|_| {}),
        }
    }
}

impl UploadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Arc::new(f);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_success = Arc::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }
}

impl fmt::Debug for UploadCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCallbacks").finish_non_exhaustive()
    }
}
