//! Transport trait for sending one sealed chunk.
//!
//! The session only depends on this trait. [`crate::HttpTransport`] is the
//! production implementation; tests plug in mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dropseal_transfer::ChunkPayload;

/// Receives the fraction (`0.0..=1.0`) of the current chunk sent so far.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Errors from a single chunk send.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("send failed: {0}")]
    Send(String),
}

/// Sends one chunk to the remote endpoint.
///
/// Implementations may call `progress` zero or more times before the
/// future resolves. Any error fails only the current attempt; retrying is
/// the session's job.
pub trait ChunkTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        payload: ChunkPayload,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}
