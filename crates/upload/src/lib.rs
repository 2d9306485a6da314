//! Chunked, encrypted, retryable and pausable uploads.
//!
//! This crate implements the upload pipeline on top of
//! `dropseal-transfer` (chunk planning) and `dropseal-crypto` (sealing).
//! The transport is a trait so the session logic stays testable with
//! mocks; [`HttpTransport`] is the reqwest-backed implementation.
//!
//! # Pipeline
//!
//! 1. **Validate**: the MIME allow-list is consulted once per file
//! 2. **Compress**: optional, non-fatal pre-processing
//! 3. **Split**: the payload is planned into fixed-size chunks
//! 4. **Seal + send**: each chunk is encrypted and sent, strictly in order,
//!    with a fixed backoff between retries of the same chunk
//! 5. **Report**: monotonic progress, then exactly one terminal callback

pub mod compression;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use compression::{CompressionError, CompressionOptions, Compressor};
pub use config::{UploadCallbacks, UploaderConfig};
pub use controller::SessionController;
pub use error::UploadError;
pub use http::HttpTransport;
pub use session::{SessionBuilder, UploadSession};
pub use transport::{ChunkTransport, ProgressFn, TransportError};
pub use types::{SUCCESS_MESSAGE, SessionSnapshot, UploadEvent};
