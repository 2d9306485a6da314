//! Events and snapshots exposed to observers.

use dropseal_transfer::SessionStatus;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Message passed to the success callback.
pub const SUCCESS_MESSAGE: &str = "File uploaded successfully";

/// Event emitted by the controller, tagged with the originating session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Overall progress of one session, in percent.
    Progress { session_id: String, percent: f64 },
    /// The session stopped at a chunk boundary after `pause`.
    Paused { session_id: String },
    /// Every chunk was accepted by the endpoint.
    Succeeded { session_id: String, message: String },
    /// A chunk exhausted its retries.
    Failed { session_id: String, error: String },
    /// The file never entered the pipeline.
    Rejected { name: String, reason: String },
    /// Compression failed; the original file is uploaded instead.
    CompressionFailed { name: String, error: String },
}

impl UploadEvent {
    /// Session id, for events that belong to a session.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            UploadEvent::Progress { session_id, .. }
            | UploadEvent::Paused { session_id }
            | UploadEvent::Succeeded { session_id, .. }
            | UploadEvent::Failed { session_id, .. } => Some(session_id),
            UploadEvent::Rejected { .. } | UploadEvent::CompressionFailed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Succeeded { .. } | UploadEvent::Failed { .. }
        )
    }
}

/// Queues `event` without waiting on the reader.
///
/// A progress event is dropped when the channel is full. Any other event is
/// handed to a detached task that waits for capacity, so an undrained
/// channel never stalls a session or the controller. Must be called inside
/// a tokio runtime.
pub(crate) fn publish(tx: &mpsc::Sender<UploadEvent>, event: UploadEvent) {
    match tx.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(UploadEvent::Progress { session_id, .. })) => {
            warn!(session = %session_id, "event channel full, dropping progress event");
        }
        Err(TrySendError::Full(event)) => {
            let tx = tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(event).await;
            });
        }
    }
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub name: String,
    pub status: SessionStatus,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub retries_remaining: u32,
    pub paused: bool,
    /// Last reported overall percentage.
    pub progress: f64,
    /// Transport attempts made so far, across all chunks.
    pub attempts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
