//! Test doubles shared by the integration tests.
//!
//! - [`ScriptedTransport`]: canned headers plus a body factory, with call counters
//! - [`RecordingStore`]: real disk via `LocalFileStore`, records calls, injects faults
//! - [`RecordingTelemetry`]: captures every message by severity

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use any_downloader_core::store::WriteHandle;
use any_downloader_core::transport::ByteStream;
use any_downloader_core::{
    FileStore, LocalFileStore, ResponseHead, StreamingResponse, Telemetry, TransferEngine,
    TransferError, Transport,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use url::Url;

type BodyFactory = Box<dyn Fn(usize) -> ByteStream + Send + Sync>;

/// Transport double: `fetch_headers` returns `head`, `fetch_stream` returns
/// `stream_head` with a body built by the factory (which receives the
/// zero-based stream call index).
pub struct ScriptedTransport {
    head: ResponseHead,
    stream_head: ResponseHead,
    body: BodyFactory,
    panic_on_stream: bool,
    pub header_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl ScriptedTransport {
    /// Serves `body` from memory under `head` for both calls.
    pub fn serving(head: ResponseHead, body: Vec<u8>) -> Self {
        Self::with_body(head, move |_| Box::new(io::Cursor::new(body.clone())))
    }

    /// Uses `factory` for every streaming body.
    pub fn with_body<F>(head: ResponseHead, factory: F) -> Self
    where
        F: Fn(usize) -> ByteStream + Send + Sync + 'static,
    {
        Self {
            stream_head: head.clone(),
            head,
            body: Box::new(factory),
            panic_on_stream: false,
            header_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// Headers succeed but the streaming fetch answers with `status`.
    pub fn stream_status(head: ResponseHead, status: StatusCode) -> Self {
        let mut transport = Self::serving(head, b"server error page".to_vec());
        transport.stream_head = ResponseHead::new(status);
        transport
    }

    /// Headers succeed; the streaming fetch panics.
    pub fn panicking(head: ResponseHead) -> Self {
        let mut transport = Self::serving(head, Vec::new());
        transport.panic_on_stream = true;
        transport
    }

    pub fn total_calls(&self) -> usize {
        self.header_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_headers(&self, _url: &Url) -> Result<ResponseHead, TransferError> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.head.clone())
    }

    async fn fetch_stream(&self, _url: &Url) -> Result<StreamingResponse, TransferError> {
        let call = self.stream_calls.fetch_add(1, Ordering::SeqCst);
        assert!(!self.panic_on_stream, "scripted transport panic");
        Ok(StreamingResponse::new(
            self.stream_head.clone(),
            (self.body)(call),
        ))
    }
}

/// Builds a 200 head with the usual download headers.
pub fn head(
    disposition: Option<&'static str>,
    content_type: Option<&'static str>,
    length: Option<u64>,
) -> ResponseHead {
    let mut head = ResponseHead::new(StatusCode::OK);
    if let Some(disposition) = disposition {
        head = head.with_header(CONTENT_DISPOSITION, HeaderValue::from_static(disposition));
    }
    if let Some(content_type) = content_type {
        head = head.with_header(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    if let Some(length) = length {
        head = head.with_header(CONTENT_LENGTH, HeaderValue::from(length));
    }
    head
}

/// Body that yields `chunks` then stalls for an hour (until cancelled).
pub fn stalling_body(chunks: &[&[u8]]) -> ByteStream {
    let mut builder = tokio_test::io::Builder::new();
    for chunk in chunks {
        builder.read(chunk);
    }
    builder.wait(Duration::from_secs(3600));
    Box::new(builder.build())
}

/// Body that yields `chunks` then fails with a connection reset.
pub fn failing_body(chunks: &[&[u8]]) -> ByteStream {
    let mut builder = tokio_test::io::Builder::new();
    for chunk in chunks {
        builder.read(chunk);
    }
    builder.read_error(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
    Box::new(builder.build())
}

/// [`FileStore`] over the real filesystem that records what the engine did.
#[derive(Default)]
pub struct RecordingStore {
    inner: LocalFileStore,
    pub deletes: Mutex<Vec<PathBuf>>,
    pub renames: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub created: Mutex<Vec<PathBuf>>,
    pub fail_rename: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl RecordingStore {
    pub fn delete_count(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStore for RecordingStore {
    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        self.deletes.lock().unwrap().push(path.to_path_buf());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "delete refused"));
        }
        self.inner.delete(path).await
    }

    async fn create_exclusive(&self, path: &Path) -> io::Result<WriteHandle> {
        self.created.lock().unwrap().push(path.to_path_buf());
        self.inner.create_exclusive(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.renames
            .lock()
            .unwrap()
            .push((from.to_path_buf(), to.to_path_buf()));
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "rename refused"));
        }
        self.inner.rename(from, to).await
    }

    async fn ensure_directory(&self, path: &Path) -> io::Result<()> {
        self.inner.ensure_directory(path).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Captures telemetry for assertions.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<(Severity, String)>>,
}

impl RecordingTelemetry {
    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == severity)
            .count()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == severity)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn info(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((Severity::Info, message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((Severity::Warn, message.to_string()));
    }

    fn error(&self, message: &str, cause: &(dyn std::error::Error + 'static)) {
        self.events
            .lock()
            .unwrap()
            .push((Severity::Error, format!("{message}: {cause}")));
    }
}

/// Engine plus handles on its doubles.
pub struct Harness {
    pub engine: Arc<TransferEngine>,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<RecordingStore>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(RecordingStore::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let engine = Arc::new(TransferEngine::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&store) as Arc<dyn FileStore>,
            Arc::clone(&telemetry) as Arc<dyn Telemetry>,
        ));
        Self {
            engine,
            transport,
            store,
            telemetry,
        }
    }
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

/// File names currently in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
