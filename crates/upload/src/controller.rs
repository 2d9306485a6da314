//! Public facade over upload sessions.
//!
//! The controller owns configuration, validates and (optionally)
//! compresses each file, then hands it to an independent
//! [`UploadSession`] running on its own task. It never retries or
//! sequences chunks itself; it only tracks sessions and relays their
//! outcome to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use dropseal_crypto::{ChunkEncryptor, KeyProvider};
use dropseal_transfer::{FileTypeValidator, FileUpload, SessionStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::compression::Compressor;
use crate::config::{UploadCallbacks, UploaderConfig};
use crate::error::UploadError;
use crate::http::HttpTransport;
use crate::session::UploadSession;
use crate::transport::ChunkTransport;
use crate::types::{SessionSnapshot, UploadEvent, publish};

/// Capacity of the event channel handed out by [`SessionController::take_events`].
const EVENT_CHANNEL_CAPACITY: usize = 1024;

type SessionTask = JoinHandle<Result<SessionStatus, UploadError>>;

struct Tracked {
    session: UploadSession,
    task: Option<SessionTask>,
}

/// Starts, pauses, resumes and observes file uploads.
pub struct SessionController {
    config: UploaderConfig,
    callbacks: UploadCallbacks,
    validator: FileTypeValidator,
    encryptor: ChunkEncryptor,
    transport: Arc<dyn ChunkTransport>,
    compressor: Option<Arc<dyn Compressor>>,
    sessions: RwLock<HashMap<String, Tracked>>,
    events_tx: Mutex<Option<mpsc::Sender<UploadEvent>>>,
}

impl SessionController {
    /// Creates a controller.
    ///
    /// Fails if `config` is invalid or if the encryptor's armor differs
    /// from `config.armor`.
    pub fn new(
        config: UploaderConfig,
        callbacks: UploadCallbacks,
        encryptor: ChunkEncryptor,
        transport: Arc<dyn ChunkTransport>,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        if encryptor.armor() != config.armor {
            return Err(UploadError::Config(format!(
                "encryptor armor {:?} does not match configured armor {:?}",
                encryptor.armor(),
                config.armor
            )));
        }
        Ok(Self {
            validator: config.validator(),
            config,
            callbacks,
            encryptor,
            transport,
            compressor: None,
            sessions: RwLock::new(HashMap::new()),
            events_tx: Mutex::new(None),
        })
    }

    /// Creates a controller that posts chunks over HTTP.
    ///
    /// The encryptor is built from `keys` and `config.armor`; the transport
    /// honours `config.request_timeout_secs`.
    pub fn with_http(
        config: UploaderConfig,
        callbacks: UploadCallbacks,
        keys: Arc<dyn KeyProvider>,
    ) -> Result<Self, UploadError> {
        let transport = HttpTransport::from_config(&config)?;
        let encryptor = ChunkEncryptor::aes_gcm(keys, config.armor);
        Self::new(config, callbacks, encryptor, Arc::new(transport))
    }

    /// Installs a pre-chunking compressor.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Returns the event receiver. Can only be taken once; sessions started
    /// before this call do not publish to it.
    pub fn take_events(&self) -> Option<mpsc::Receiver<UploadEvent>> {
        let mut tx = lock(&self.events_tx);
        if tx.is_some() {
            return None;
        }
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *tx = Some(events_tx);
        Some(events_rx)
    }

    /// Validates, compresses and starts uploading one file.
    ///
    /// Returns the new session id. A disallowed type is reported through
    /// the error callback and returned as [`UploadError::Validation`]; no
    /// session is created. Must be called inside a tokio runtime.
    pub async fn start(&self, file: FileUpload) -> Result<String, UploadError> {
        if !self.validator.is_allowed(&file.mime_type) {
            let err = UploadError::Validation {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            };
            warn!(name = %file.name, mime = %file.mime_type, "file type rejected");
            (self.callbacks.on_error)(&err);
            self.emit(UploadEvent::Rejected {
                name: file.name,
                reason: err.to_string(),
            });
            return Err(err);
        }

        let file = self.compress(file).await;

        let mut builder = UploadSession::builder(
            file.data,
            self.encryptor.clone(),
            Arc::clone(&self.transport),
        )
        .name(file.name)
        .endpoint(self.config.endpoint.clone())
        .chunk_size(self.config.chunk_size)
        .max_retries(self.config.max_retries)
        .backoff(self.config.retry_backoff())
        .callbacks(self.callbacks.clone());
        if let Some(tx) = self.events_sender() {
            builder = builder.events(tx);
        }
        let session = builder.build()?;
        let id = session.id().to_string();

        let runner = session.clone();
        let task = tokio::spawn(async move { runner.run().await });

        self.write_sessions().insert(
            id.clone(),
            Tracked {
                session,
                task: Some(task),
            },
        );
        Ok(id)
    }

    /// Starts one independent session per file.
    ///
    /// A rejected file does not stop the others; each gets its own result.
    pub async fn start_all(
        &self,
        files: impl IntoIterator<Item = FileUpload>,
    ) -> Vec<Result<String, UploadError>> {
        let mut results = Vec::new();
        for file in files {
            results.push(self.start(file).await);
        }
        results
    }

    /// Asks a session to stop at its next chunk boundary.
    pub fn pause(&self, id: &str) -> Result<(), UploadError> {
        let sessions = self.read_sessions();
        let tracked = sessions
            .get(id)
            .ok_or_else(|| UploadError::SessionNotFound(id.to_string()))?;
        if tracked.session.pause() {
            Ok(())
        } else {
            Err(UploadError::SessionNotActive(id.to_string()))
        }
    }

    /// Resumes a paused session from its current chunk.
    pub fn resume(&self, id: &str) -> Result<(), UploadError> {
        let mut sessions = self.write_sessions();
        let tracked = sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::SessionNotFound(id.to_string()))?;
        if tracked.session.request_resume()? {
            let runner = tracked.session.clone();
            tracked.task = Some(tokio::spawn(async move { runner.drive().await }));
        }
        Ok(())
    }

    /// Pauses every non-terminal session.
    pub fn pause_all(&self) {
        for tracked in self.read_sessions().values() {
            tracked.session.pause();
        }
    }

    /// Resumes every paused session.
    pub fn resume_all(&self) {
        let ids: Vec<String> = self.read_sessions().keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.resume(&id) {
                tracing::debug!(session = %id, error = %e, "skipping resume");
            }
        }
    }

    pub fn status(&self, id: &str) -> Option<SessionStatus> {
        self.read_sessions().get(id).map(|t| t.session.status())
    }

    pub fn snapshot(&self, id: &str) -> Option<SessionSnapshot> {
        self.read_sessions().get(id).map(|t| t.session.snapshot())
    }

    /// Snapshots of every tracked session.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.read_sessions()
            .values()
            .map(|t| t.session.snapshot())
            .collect()
    }

    /// Waits for the session's current driving task to stop.
    ///
    /// Returns `Paused` if it stopped at a boundary, `Succeeded` on
    /// completion, or the session's terminal error. Once the task has been
    /// awaited, later calls return the settled status.
    pub async fn wait(&self, id: &str) -> Result<SessionStatus, UploadError> {
        let (task, session) = {
            let mut sessions = self.write_sessions();
            let tracked = sessions
                .get_mut(id)
                .ok_or_else(|| UploadError::SessionNotFound(id.to_string()))?;
            (tracked.task.take(), tracked.session.clone())
        };

        match task {
            Some(task) => task.await.map_err(|e| {
                UploadError::SessionNotActive(format!("{id}: task join error: {e}"))
            })?,
            None => Ok(session.status()),
        }
    }

    /// Stops tracking a session. Running sessions keep running.
    pub fn untrack(&self, id: &str) -> bool {
        self.write_sessions().remove(id).is_some()
    }

    /// Drops every terminal session; returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut sessions = self.write_sessions();
        let before = sessions.len();
        sessions.retain(|_, t| !t.session.status().is_terminal());
        before - sessions.len()
    }

    /// Runs the compressor if one is installed. Failure keeps the original.
    async fn compress(&self, file: FileUpload) -> FileUpload {
        let Some(compressor) = &self.compressor else {
            return file;
        };

        match compressor.compress(&file, self.config.compression).await {
            Ok(compressed) => {
                info!(
                    name = %file.name,
                    before = file.len(),
                    after = compressed.len(),
                    "file compressed"
                );
                compressed
            }
            Err(e) => {
                warn!(name = %file.name, error = %e, "compression failed, uploading original");
                let err = UploadError::Compression(e);
                (self.callbacks.on_error)(&err);
                self.emit(UploadEvent::CompressionFailed {
                    name: file.name.clone(),
                    error: err.to_string(),
                });
                file
            }
        }
    }

    fn events_sender(&self) -> Option<mpsc::Sender<UploadEvent>> {
        lock(&self.events_tx).clone()
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = self.events_sender() {
            publish(&tx, event);
        }
    }

    fn read_sessions(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Tracked>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Tracked>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
