//! Per-file upload session: the chunk state machine.
//!
//! A session walks its chunks strictly in order. Each chunk is sliced,
//! sealed and sent; a failed attempt (sealing or transport) is retried
//! after a fixed backoff until the chunk's retry budget runs out, which is
//! the only way a session reaches `Failed`. `pause` is cooperative: it is
//! read at chunk boundaries only, so an in-flight chunk always finishes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use dropseal_crypto::{ChunkEncryptor, CryptoError};
use dropseal_transfer::{
    ChunkDescriptor, ChunkPayload, ChunkPlan, DEFAULT_CHUNK_SIZE, ProgressGate, SessionStatus,
    overall_percent,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS, UploadCallbacks};
use crate::error::UploadError;
use crate::transport::{ChunkTransport, ProgressFn};
use crate::types::{SUCCESS_MESSAGE, SessionSnapshot, UploadEvent, publish};

/// Builds an [`UploadSession`].
pub struct SessionBuilder {
    id: Option<String>,
    name: String,
    endpoint: String,
    file: Bytes,
    chunk_size: usize,
    max_retries: u32,
    backoff: Duration,
    encryptor: ChunkEncryptor,
    transport: Arc<dyn ChunkTransport>,
    callbacks: UploadCallbacks,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl SessionBuilder {
    /// Session id. Defaults to a random UUID.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn callbacks(mut self, callbacks: UploadCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn events(mut self, events: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Plans the chunks. Fails if the chunk size is zero.
    pub fn build(self) -> Result<UploadSession, UploadError> {
        let plan = ChunkPlan::new(self.file.len(), self.chunk_size)?;
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(UploadSession {
            inner: Arc::new(SessionInner {
                id,
                name: self.name,
                endpoint: self.endpoint,
                file: self.file,
                plan,
                max_retries: self.max_retries,
                backoff: self.backoff,
                encryptor: self.encryptor,
                transport: self.transport,
                callbacks: self.callbacks,
                events: self.events,
                state: Mutex::new(SessionState {
                    status: SessionStatus::Idle,
                    current_chunk: 0,
                    retries_remaining: self.max_retries,
                    paused: false,
                    gate: ProgressGate::new(),
                    attempts: 0,
                    error: None,
                }),
            }),
        })
    }
}

/// One in-memory transfer of a single file.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct UploadSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    name: String,
    endpoint: String,
    file: Bytes,
    plan: ChunkPlan,
    max_retries: u32,
    backoff: Duration,
    encryptor: ChunkEncryptor,
    transport: Arc<dyn ChunkTransport>,
    callbacks: UploadCallbacks,
    events: Option<mpsc::Sender<UploadEvent>>,
    state: Mutex<SessionState>,
}

struct SessionState {
    status: SessionStatus,
    current_chunk: usize,
    retries_remaining: u32,
    paused: bool,
    gate: ProgressGate,
    attempts: u64,
    error: Option<String>,
}

/// What the driving loop does at a chunk boundary.
enum Boundary {
    Upload(ChunkDescriptor),
    Paused,
    Complete,
}

impl UploadSession {
    /// Starts building a session over `file`.
    pub fn builder(
        file: Bytes,
        encryptor: ChunkEncryptor,
        transport: Arc<dyn ChunkTransport>,
    ) -> SessionBuilder {
        SessionBuilder {
            id: None,
            name: String::new(),
            endpoint: String::new(),
            file,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            encryptor,
            transport,
            callbacks: UploadCallbacks::default(),
            events: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn total_chunks(&self) -> usize {
        self.inner.plan.total_chunks()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn current_chunk(&self) -> usize {
        self.lock().current_chunk
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.lock();
        SessionSnapshot {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
            status: s.status,
            current_chunk: s.current_chunk,
            total_chunks: self.inner.plan.total_chunks(),
            retries_remaining: s.retries_remaining,
            paused: s.paused,
            progress: s.gate.last(),
            attempts: s.attempts,
            error: s.error.clone(),
        }
    }

    /// Runs the session from `Idle` until it succeeds, fails or pauses.
    ///
    /// Returns the status the loop stopped in (`Succeeded` or `Paused`);
    /// exhausting a chunk's retries returns
    /// [`UploadError::MaxRetriesExceeded`].
    pub async fn run(&self) -> Result<SessionStatus, UploadError> {
        {
            let mut s = self.lock();
            if s.status != SessionStatus::Idle {
                return Err(UploadError::SessionNotActive(self.inner.id.clone()));
            }
            s.status = SessionStatus::Running;
            s.retries_remaining = self.inner.max_retries;
        }
        info!(
            session = %self.inner.id,
            name = %self.inner.name,
            bytes = self.inner.file.len(),
            total_chunks = self.inner.plan.total_chunks(),
            "upload started"
        );
        self.drive().await
    }

    /// Requests a stop at the next chunk boundary.
    ///
    /// Returns `false` if the session is already terminal.
    pub fn pause(&self) -> bool {
        let mut s = self.lock();
        if s.status.is_terminal() {
            return false;
        }
        if !s.paused {
            s.paused = true;
            debug!(session = %self.inner.id, chunk = s.current_chunk, "pause requested");
        }
        true
    }

    /// Clears the pause request and, if the loop had stopped, re-enters it
    /// at the current chunk with a fresh retry budget.
    ///
    /// If the loop is still running (pause requested but the in-flight
    /// chunk has not finished yet) the request is simply withdrawn.
    pub async fn resume(&self) -> Result<SessionStatus, UploadError> {
        if self.request_resume()? {
            self.drive().await
        } else {
            Ok(self.status())
        }
    }

    /// Returns `true` when the caller must drive the loop again.
    pub(crate) fn request_resume(&self) -> Result<bool, UploadError> {
        let mut s = self.lock();
        if s.status.is_terminal() {
            return Err(UploadError::SessionNotActive(self.inner.id.clone()));
        }
        s.paused = false;
        if s.status != SessionStatus::Paused {
            return Ok(false);
        }
        s.status = SessionStatus::Running;
        s.retries_remaining = self.inner.max_retries;
        info!(session = %self.inner.id, chunk = s.current_chunk, "upload resumed");
        Ok(true)
    }

    /// The driving loop. Caller must have moved the session to `Running`.
    pub(crate) async fn drive(&self) -> Result<SessionStatus, UploadError> {
        loop {
            match self.boundary() {
                Boundary::Upload(descriptor) => self.upload_chunk(descriptor).await?,
                Boundary::Paused => {
                    info!(
                        session = %self.inner.id,
                        chunk = self.current_chunk(),
                        "upload paused"
                    );
                    self.emit(UploadEvent::Paused {
                        session_id: self.inner.id.clone(),
                    });
                    return Ok(SessionStatus::Paused);
                }
                Boundary::Complete => {
                    info!(session = %self.inner.id, name = %self.inner.name, "upload complete");
                    (self.inner.callbacks.on_success)(SUCCESS_MESSAGE);
                    self.emit(UploadEvent::Succeeded {
                        session_id: self.inner.id.clone(),
                        message: SUCCESS_MESSAGE.to_string(),
                    });
                    return Ok(SessionStatus::Succeeded);
                }
            }
        }
    }

    /// Chunk-boundary check: the only place the pause flag is read.
    fn boundary(&self) -> Boundary {
        let mut s = self.lock();
        if s.paused {
            s.status = SessionStatus::Paused;
            return Boundary::Paused;
        }
        match self.inner.plan.descriptor(s.current_chunk) {
            Some(descriptor) => Boundary::Upload(descriptor),
            None => {
                s.status = SessionStatus::Succeeded;
                Boundary::Complete
            }
        }
    }

    /// Sends one chunk, retrying the same chunk until it succeeds or its
    /// retry budget is spent.
    async fn upload_chunk(&self, descriptor: ChunkDescriptor) -> Result<(), UploadError> {
        let total_chunks = self.inner.plan.total_chunks();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.lock().attempts += 1;
            debug!(
                session = %self.inner.id,
                chunk = descriptor.number(),
                total_chunks,
                bytes = descriptor.length,
                attempt,
                "sending chunk"
            );

            let err = match self.attempt(descriptor).await {
                Ok(()) => {
                    self.report_progress(descriptor.index, 1.0);
                    let mut s = self.lock();
                    s.current_chunk += 1;
                    s.retries_remaining = self.inner.max_retries;
                    return Ok(());
                }
                Err(e) => e,
            };

            let retry = {
                let mut s = self.lock();
                if s.retries_remaining > 0 {
                    s.retries_remaining -= 1;
                    true
                } else {
                    false
                }
            };

            if retry {
                warn!(
                    session = %self.inner.id,
                    chunk = descriptor.number(),
                    attempt,
                    error = %err,
                    backoff_ms = self.inner.backoff.as_millis() as u64,
                    "chunk attempt failed, retrying"
                );
                tokio::time::sleep(self.inner.backoff).await;
                continue;
            }

            let fatal = UploadError::MaxRetriesExceeded {
                chunk: descriptor.number(),
                total_chunks,
                attempts: attempt,
                last_error: err.to_string(),
            };
            {
                let mut s = self.lock();
                s.status = SessionStatus::Failed;
                s.error = Some(fatal.to_string());
            }
            error!(session = %self.inner.id, error = %fatal, "upload failed");
            (self.inner.callbacks.on_error)(&fatal);
            self.emit(UploadEvent::Failed {
                session_id: self.inner.id.clone(),
                error: fatal.to_string(),
            });
            return Err(fatal);
        }
    }

    /// One attempt: slice, seal (fresh nonce every time), send.
    async fn attempt(&self, descriptor: ChunkDescriptor) -> Result<(), UploadError> {
        let plaintext = descriptor.slice(&self.inner.file)?;
        let encryptor = self.inner.encryptor.clone();
        let sealed = tokio::task::spawn_blocking(move || encryptor.seal(&plaintext))
            .await
            .map_err(|e| CryptoError::Encrypt(format!("task join error: {e}")))??;

        let payload = ChunkPayload {
            upload_id: self.inner.id.clone(),
            chunk_number: descriptor.number(),
            total_chunks: self.inner.plan.total_chunks(),
            data: sealed,
            content_type: self.inner.encryptor.content_type(),
        };

        let session = self.clone();
        let index = descriptor.index;
        let progress: ProgressFn = Arc::new(move |fraction| session.report_progress(index, fraction));

        self.inner
            .transport
            .send(&self.inner.endpoint, payload, progress)
            .await?;
        Ok(())
    }

    fn report_progress(&self, chunk_index: usize, fraction: f64) {
        let percent = {
            let mut s = self.lock();
            if s.status != SessionStatus::Running || chunk_index != s.current_chunk {
                return;
            }
            let percent = overall_percent(chunk_index, fraction, self.inner.plan.total_chunks());
            match s.gate.admit(percent) {
                Some(p) => p,
                None => return,
            }
        };

        (self.inner.callbacks.on_progress)(percent);
        self.emit(UploadEvent::Progress {
            session_id: self.inner.id.clone(),
            percent,
        });
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.inner.events {
            publish(tx, event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use dropseal_crypto::{Armor, EnvKeyProvider, SecretKey, StaticKeyProvider, open_chunk};
    use std::future::Future;
    use std::pin::Pin;
    use tokio::sync::Notify;

    const KEY: [u8; 32] = [9u8; 32];

    fn encryptor() -> ChunkEncryptor {
        ChunkEncryptor::aes_gcm(
            Arc::new(StaticKeyProvider::new(SecretKey::from_bytes(KEY))),
            Armor::Raw,
        )
    }

    /// Records every attempt; fails the first `fail_first` attempts.
    struct MockTransport {
        attempts: Mutex<Vec<ChunkPayload>>,
        fail_first: usize,
        fractions: Vec<f64>,
    }

    impl MockTransport {
        fn new(fail_first: usize) -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                fail_first,
                fractions: vec![0.25, 0.5, 0.75],
            }
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        fn chunk_numbers(&self) -> Vec<usize> {
            self.attempts
                .lock()
                .unwrap()
                .iter()
                .map(|p| p.chunk_number)
                .collect()
        }
    }

    impl ChunkTransport for MockTransport {
        fn send<'a>(
            &'a self,
            _endpoint: &'a str,
            payload: ChunkPayload,
            progress: ProgressFn,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
            Box::pin(async move {
                let n = {
                    let mut attempts = self.attempts.lock().unwrap();
                    attempts.push(payload);
                    attempts.len()
                };
                for f in &self.fractions {
                    progress(*f);
                }
                if n <= self.fail_first {
                    Err(TransportError::Status {
                        status: 503,
                        body: "unavailable".into(),
                    })
                } else {
                    Ok(())
                }
            })
        }
    }

    /// Blocks every send until released, so tests can act mid-chunk.
    struct GatedTransport {
        sent: Mutex<Vec<usize>>,
        entered: Notify,
        release: Notify,
    }

    impl GatedTransport {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    impl ChunkTransport for GatedTransport {
        fn send<'a>(
            &'a self,
            _endpoint: &'a str,
            payload: ChunkPayload,
            _progress: ProgressFn,
        ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                self.sent.lock().unwrap().push(payload.chunk_number);
                Ok(())
            })
        }
    }

    fn session(data: &[u8], chunk_size: usize, transport: Arc<dyn ChunkTransport>) -> SessionBuilder {
        UploadSession::builder(Bytes::copy_from_slice(data), encryptor(), transport)
            .id("s1")
            .name("test.bin")
            .endpoint("http://localhost/upload")
            .chunk_size(chunk_size)
    }

    #[tokio::test]
    async fn uploads_all_chunks_in_order() {
        let transport = Arc::new(MockTransport::new(0));
        let s = session(b"0123456789", 4, transport.clone()).build().unwrap();
        assert_eq!(s.total_chunks(), 3);
        assert_eq!(s.status(), SessionStatus::Idle);

        let status = s.run().await.unwrap();
        assert_eq!(status, SessionStatus::Succeeded);
        assert_eq!(s.current_chunk(), 3);
        assert_eq!(transport.chunk_numbers(), vec![1, 2, 3]);

        // Each payload carries position metadata and opens to the original slice.
        let attempts = transport.attempts.lock().unwrap();
        let key = SecretKey::from_bytes(KEY);
        let opened: Vec<u8> = attempts
            .iter()
            .flat_map(|p| {
                assert_eq!(p.total_chunks, 3);
                assert_eq!(p.upload_id, "s1");
                open_chunk(&key, &p.data, Armor::Raw).unwrap()
            })
            .collect();
        assert_eq!(opened, b"0123456789");
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callbacks = UploadCallbacks::new().on_progress(move |p| sink.lock().unwrap().push(p));

        let transport = Arc::new(MockTransport::new(0));
        let s = session(&[0u8; 40], 10, transport)
            .callbacks(callbacks)
            .build()
            .unwrap();
        s.run().await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(*seen.first().unwrap(), 6.25);
        assert_eq!(*seen.last().unwrap(), 100.0);
        assert_eq!(s.snapshot().progress, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_silently() {
        let errors = Arc::new(Mutex::new(0usize));
        let e = Arc::clone(&errors);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callbacks = UploadCallbacks::new()
            .on_error(move |_| *e.lock().unwrap() += 1)
            .on_progress(move |p| sink.lock().unwrap().push(p));

        let transport = Arc::new(MockTransport::new(2));
        let s = session(b"abcdefgh", 4, transport.clone())
            .max_retries(3)
            .callbacks(callbacks)
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        assert_eq!(s.run().await.unwrap(), SessionStatus::Succeeded);

        // Chunk 1 took three attempts, chunk 2 one.
        assert_eq!(transport.chunk_numbers(), vec![1, 1, 1, 2]);
        assert_eq!(*errors.lock().unwrap(), 0);
        // Two fixed one-second backoffs.
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));

        // Retries restart the chunk fraction; observers never see it go back.
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(s.snapshot().attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fail_the_session() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        let successes = Arc::new(Mutex::new(0usize));
        let ok = Arc::clone(&successes);
        let callbacks = UploadCallbacks::new()
            .on_error(move |err| e.lock().unwrap().push(err.to_string()))
            .on_success(move |_| *ok.lock().unwrap() += 1);

        let transport = Arc::new(MockTransport::new(usize::MAX));
        let s = session(b"abcdefgh", 4, transport.clone())
            .max_retries(2)
            .callbacks(callbacks)
            .build()
            .unwrap();

        let err = s.run().await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::MaxRetriesExceeded { chunk: 1, attempts: 3, .. }
        ));
        assert_eq!(transport.attempt_count(), 3);
        assert_eq!(s.status(), SessionStatus::Failed);
        assert_eq!(s.current_chunk(), 0);
        assert_eq!(*successes.lock().unwrap(), 0);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("max retries exceeded"));
        assert!(s.snapshot().error.unwrap().contains("HTTP status 503"));
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let transport = Arc::new(MockTransport::new(1));
        let s = session(b"abc", 4, transport.clone())
            .max_retries(0)
            .build()
            .unwrap();
        assert!(s.run().await.is_err());
        assert_eq!(transport.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_resets_per_chunk() {
        // Every chunk fails once; with one retry each, all succeed.
        struct FailOnce {
            seen: Mutex<Vec<usize>>,
        }
        impl ChunkTransport for FailOnce {
            fn send<'a>(
                &'a self,
                _endpoint: &'a str,
                payload: ChunkPayload,
                _progress: ProgressFn,
            ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
                Box::pin(async move {
                    let mut seen = self.seen.lock().unwrap();
                    let first = !seen.contains(&payload.chunk_number);
                    seen.push(payload.chunk_number);
                    if first {
                        Err(TransportError::Send("reset".into()))
                    } else {
                        Ok(())
                    }
                })
            }
        }

        let transport = Arc::new(FailOnce {
            seen: Mutex::new(Vec::new()),
        });
        let s = session(&[1u8; 12], 4, transport.clone())
            .max_retries(1)
            .build()
            .unwrap();
        assert_eq!(s.run().await.unwrap(), SessionStatus::Succeeded);
        assert_eq!(*transport.seen.lock().unwrap(), vec![1, 1, 2, 2, 3, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn encryption_failure_uses_retry_policy() {
        let transport = Arc::new(MockTransport::new(0));
        let keys = EnvKeyProvider::new("DROPSEAL_SESSION_TEST_UNSET_KEY");
        let enc = ChunkEncryptor::aes_gcm(Arc::new(keys), Armor::Raw);
        let s = UploadSession::builder(Bytes::from_static(b"data"), enc, transport.clone())
            .max_retries(2)
            .build()
            .unwrap();

        let err = s.run().await.unwrap_err();
        match err {
            UploadError::MaxRetriesExceeded {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("key unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn retried_chunk_is_resealed() {
        let transport = Arc::new(MockTransport::new(1));
        let s = session(b"same", 4, transport.clone())
            .backoff(Duration::ZERO)
            .build()
            .unwrap();
        s.run().await.unwrap();

        let attempts = transport.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0].data, attempts[1].data);
    }

    #[tokio::test]
    async fn empty_file_succeeds_without_sending() {
        let transport = Arc::new(MockTransport::new(0));
        let s = session(b"", 4, transport.clone()).build().unwrap();
        assert_eq!(s.total_chunks(), 0);
        assert_eq!(s.run().await.unwrap(), SessionStatus::Succeeded);
        assert_eq!(transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn zero_chunk_size_rejected() {
        let transport = Arc::new(MockTransport::new(0));
        assert!(matches!(
            session(b"abc", 0, transport).build(),
            Err(UploadError::Transfer(_))
        ));
    }

    #[tokio::test]
    async fn run_twice_is_rejected() {
        let transport = Arc::new(MockTransport::new(0));
        let s = session(b"abc", 4, transport).build().unwrap();
        s.run().await.unwrap();
        assert!(matches!(
            s.run().await,
            Err(UploadError::SessionNotActive(_))
        ));
        assert!(!s.pause());
        assert!(matches!(
            s.resume().await,
            Err(UploadError::SessionNotActive(_))
        ));
    }

    #[tokio::test]
    async fn pause_takes_effect_at_next_boundary() {
        let transport = Arc::new(GatedTransport::new());
        let s = session(b"aaaabbbbcccc", 4, transport.clone()).build().unwrap();

        let runner = s.clone();
        let task = tokio::spawn(async move { runner.run().await });

        // Chunk 1 is in flight: pause, then let it finish.
        transport.entered.notified().await;
        assert!(s.pause());
        assert_eq!(s.status(), SessionStatus::Running);
        transport.release.notify_one();

        let status = task.await.unwrap().unwrap();
        assert_eq!(status, SessionStatus::Paused);
        assert_eq!(s.current_chunk(), 1);
        assert_eq!(*transport.sent.lock().unwrap(), vec![1]);

        // Resume picks up at chunk 2 and finishes.
        let runner = s.clone();
        let task = tokio::spawn(async move { runner.resume().await });
        for _ in 0..2 {
            transport.entered.notified().await;
            transport.release.notify_one();
        }
        assert_eq!(task.await.unwrap().unwrap(), SessionStatus::Succeeded);
        assert_eq!(*transport.sent.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn resume_before_boundary_withdraws_pause() {
        let transport = Arc::new(GatedTransport::new());
        let s = session(b"aaaabbbb", 4, transport.clone()).build().unwrap();

        let runner = s.clone();
        let task = tokio::spawn(async move { runner.run().await });

        transport.entered.notified().await;
        s.pause();
        // Loop is still running, so this does not start a second driver.
        assert_eq!(s.resume().await.unwrap(), SessionStatus::Running);
        assert!(!s.is_paused());
        transport.release.notify_one();

        transport.entered.notified().await;
        transport.release.notify_one();
        assert_eq!(task.await.unwrap().unwrap(), SessionStatus::Succeeded);
        assert_eq!(*transport.sent.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn pause_before_run_stops_immediately() {
        let transport = Arc::new(MockTransport::new(0));
        let s = session(b"abcdefgh", 4, transport.clone()).build().unwrap();
        assert!(s.pause());
        assert_eq!(s.run().await.unwrap(), SessionStatus::Paused);
        assert_eq!(transport.attempt_count(), 0);

        assert_eq!(s.resume().await.unwrap(), SessionStatus::Succeeded);
        assert_eq!(transport.chunk_numbers(), vec![1, 2]);
    }

    #[tokio::test]
    async fn events_follow_callbacks() {
        let (tx, mut rx) = mpsc::channel(64);
        let transport = Arc::new(MockTransport::new(0));
        let s = session(b"abcdefgh", 4, transport)
            .events(tx)
            .build()
            .unwrap();
        s.run().await.unwrap();
        drop(s);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert!(matches!(
            events.last(),
            Some(UploadEvent::Succeeded { session_id, .. }) if session_id == "s1"
        ));
        assert!(
            events
                .iter()
                .filter(|e| matches!(e, UploadEvent::Progress { .. }))
                .count()
                >= 2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_failing_chunk_runs_out_its_retries() {
        /// Always fails; signals each attempt.
        struct Refusing {
            attempts: Mutex<usize>,
            entered: Notify,
        }
        impl ChunkTransport for Refusing {
            fn send<'a>(
                &'a self,
                _endpoint: &'a str,
                _payload: ChunkPayload,
                _progress: ProgressFn,
            ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
                Box::pin(async move {
                    *self.attempts.lock().unwrap() += 1;
                    self.entered.notify_one();
                    Err(TransportError::Send("connection refused".into()))
                })
            }
        }

        let errors = Arc::new(Mutex::new(0usize));
        let e = Arc::clone(&errors);
        let callbacks = UploadCallbacks::new().on_error(move |_| *e.lock().unwrap() += 1);

        let transport = Arc::new(Refusing {
            attempts: Mutex::new(0),
            entered: Notify::new(),
        });
        let s = session(b"aaaabbbb", 4, transport.clone())
            .max_retries(2)
            .callbacks(callbacks)
            .build()
            .unwrap();

        let runner = s.clone();
        let task = tokio::spawn(async move { runner.run().await });

        // First attempt of chunk 1 has failed; the session is in its backoff.
        transport.entered.notified().await;
        assert!(s.pause());

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            UploadError::MaxRetriesExceeded { chunk: 1, attempts: 3, .. }
        ));
        assert_eq!(*transport.attempts.lock().unwrap(), 3);
        assert_eq!(s.status(), SessionStatus::Failed);
        assert_eq!(s.current_chunk(), 0);
        assert_eq!(*errors.lock().unwrap(), 1);
    }
}
