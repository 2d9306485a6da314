use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::TransferError;
use crate::validation::guess_mime_type;

/// A file handed to the uploader.
///
/// `data` is shared, never copied: chunks are zero-copy views into it.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Display name (usually the file name).
    pub name: String,
    /// MIME type used for allow-list validation.
    pub mime_type: String,
    /// File contents.
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime_type: guess_mime_type(path).to_string(),
            data: Bytes::from(data),
        })
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One sealed chunk ready for the transport.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    /// Session identifier, lets the receiver group chunks of one file.
    pub upload_id: String,
    /// 1-based chunk number.
    pub chunk_number: usize,
    /// Total chunks in the session.
    pub total_chunks: usize,
    /// Encrypted (and possibly armored) chunk bytes.
    pub data: Bytes,
    /// Content type of `data`.
    pub content_type: &'static str,
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl SessionStatus {
    /// `Succeeded` and `Failed` are terminal; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Succeeded | SessionStatus::Failed)
    }
}
