//! reqwest-backed chunk transport.
//!
//! Each chunk is one `multipart/form-data` POST:
//!
//! | Field | Value |
//! |-------|-------|
//! | `file` | sealed chunk, filename `chunk-<n>` |
//! | `chunkNumber` | 1-based chunk number |
//! | `totalChunks` | chunk count for the file |
//! | `uploadId` | session id, groups the chunks of one file |
//!
//! The file part is streamed in fixed slices so byte-level progress can be
//! reported while the body is being written.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use dropseal_transfer::ChunkPayload;
use futures_util::Stream;
use reqwest::multipart::{Form, Part};
use tracing::trace;

use crate::config::UploaderConfig;
use crate::transport::{ChunkTransport, ProgressFn, TransportError};

/// Size of the body slices progress is reported on.
const STREAM_SLICE: usize = 64 * 1024;

/// HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with an optional per-request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self, TransportError> {
        Self::new(config.request_timeout())
    }

    /// Wraps an existing client (shared connection pool, custom TLS, ...).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post(
        &self,
        endpoint: &str,
        payload: ChunkPayload,
        progress: ProgressFn,
    ) -> Result<(), TransportError> {
        let len = payload.data.len() as u64;
        let body = reqwest::Body::wrap_stream(progress_stream(payload.data, progress));
        let part = Part::stream_with_length(body, len)
            .file_name(format!("chunk-{}", payload.chunk_number))
            .mime_str(payload.content_type)?;

        let form = Form::new()
            .part("file", part)
            .text("chunkNumber", payload.chunk_number.to_string())
            .text("totalChunks", payload.total_chunks.to_string())
            .text("uploadId", payload.upload_id);

        let resp = self.http.post(endpoint).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        trace!(chunk = payload.chunk_number, status = status.as_u16(), "chunk accepted");
        Ok(())
    }
}

impl ChunkTransport for HttpTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        payload: ChunkPayload,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(self.post(endpoint, payload, progress))
    }
}

/// Yields `data` in [`STREAM_SLICE`] pieces, reporting the fraction handed
/// to the connection after each one.
fn progress_stream(
    data: Bytes,
    progress: ProgressFn,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len();
    let slices: Vec<Bytes> = (0..total)
        .step_by(STREAM_SLICE)
        .map(|start| data.slice(start..std::cmp::min(start + STREAM_SLICE, total)))
        .collect();

    let mut sent = 0usize;
    futures_util::stream::iter(slices.into_iter().map(move |slice| {
        sent += slice.len();
        progress(sent as f64 / total as f64);
        Ok(slice)
    }))
}
