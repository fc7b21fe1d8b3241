//! Streaming transfer engine.
//!
//! [`TransferEngine`] resolves where a URL should land, then copies the
//! response body into a `.part` sibling of the destination and renames it
//! into place once the whole body is on disk. Any failure removes the
//! `.part` file, so a failed transfer leaves no durable file behind.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use any_downloader_core::{
//!     HttpTransport, LocalFileStore, TracingTelemetry, TransferEngine, parse_source_url,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TransferEngine::new(
//!     Arc::new(HttpTransport::new()?),
//!     Arc::new(LocalFileStore::new()),
//!     Arc::new(TracingTelemetry::new()),
//! );
//! let url = parse_source_url("https://example.com/paper.pdf")?;
//! let path = engine.resolve_destination(&url, Path::new("./downloads")).await?;
//! let report = engine
//!     .transfer(&url, &path, None, &CancellationToken::new())
//!     .await?;
//! println!("{} bytes -> {}", report.bytes_downloaded, report.path.display());
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::filename::resolve_file_name;
use super::{ProgressSample, TransferError};
use crate::store::FileStore;
use crate::telemetry::Telemetry;
use crate::transport::Transport;

/// Suffix appended to the destination path while the body is streaming.
pub const PART_SUFFIX: &str = ".part";

/// Default read buffer size (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Progress sink invoked once per chunk on the transfer's own task.
pub type ProgressCallback<'a> = dyn FnMut(ProgressSample) + Send + 'a;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Size of the buffer each body read fills at most.
    pub chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Where the file was published.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes_downloaded: u64,
    /// Length the server declared, if any.
    pub total_bytes: Option<u64>,
}

/// Parses a user-supplied URL, accepting only absolute `http`/`https` URLs.
///
/// # Errors
///
/// - [`TransferError::UnsupportedScheme`] when the URL has no scheme or a
///   scheme other than `http`/`https`.
/// - [`TransferError::InvalidArgument`] when the input is empty or otherwise
///   malformed (e.g. `http://` without a host).
pub fn parse_source_url(raw: &str) -> Result<Url, TransferError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TransferError::invalid_argument("URL must not be empty"));
    }

    let url = Url::parse(trimmed).map_err(|error| match error {
        url::ParseError::RelativeUrlWithoutBase => TransferError::unsupported_scheme(trimmed, ""),
        other => TransferError::invalid_argument(format!("malformed URL '{trimmed}': {other}")),
    })?;
    ensure_supported_scheme(&url)?;
    Ok(url)
}

/// Rejects any parsed URL whose scheme is not `http` or `https`.
///
/// # Errors
///
/// Returns [`TransferError::UnsupportedScheme`] for other schemes.
pub fn ensure_supported_scheme(url: &Url) -> Result<(), TransferError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransferError::unsupported_scheme(url.as_str(), other)),
    }
}

/// Returns `destination` with [`PART_SUFFIX`] appended to its file name.
#[must_use]
pub fn part_path(destination: &Path) -> PathBuf {
    let mut raw: OsString = destination.as_os_str().to_owned();
    raw.push(PART_SUFFIX);
    PathBuf::from(raw)
}

/// Resolves destinations and streams bodies to disk.
///
/// Holds no per-transfer state: one engine serves any number of concurrent
/// transfers.
pub struct TransferEngine {
    transport: Arc<dyn Transport>,
    store: Arc<dyn FileStore>,
    telemetry: Arc<dyn Telemetry>,
    config: EngineConfig,
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransferEngine {
    /// Creates an engine with the default 8 KiB chunk size.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn FileStore>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            transport,
            store,
            telemetry,
            config: EngineConfig::default(),
        }
    }

    /// Creates an engine with explicit tuning.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidArgument`] if `chunk_size` is zero.
    pub fn with_config(
        transport: Arc<dyn Transport>,
        store: Arc<dyn FileStore>,
        telemetry: Arc<dyn Telemetry>,
        config: EngineConfig,
    ) -> Result<Self, TransferError> {
        if config.chunk_size == 0 {
            return Err(TransferError::invalid_argument("chunk size must be non-zero"));
        }
        Ok(Self {
            transport,
            store,
            telemetry,
            config,
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Returns the file store the engine writes through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Returns the telemetry sink.
    #[must_use]
    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    /// Determines the destination path for `url` inside
    /// `destination_directory` from a headers-only fetch.
    ///
    /// Never writes any file.
    ///
    /// # Errors
    ///
    /// - [`TransferError::UnsupportedScheme`] for non-`http(s)` URLs (checked
    ///   before any network call).
    /// - [`TransferError::InvalidArgument`] for an empty directory.
    /// - [`TransferError::HttpStatus`] / [`TransferError::Network`] when the
    ///   header fetch fails.
    #[instrument(skip(self), fields(url = %url, dir = %destination_directory.display()))]
    pub async fn resolve_destination(
        &self,
        url: &Url,
        destination_directory: &Path,
    ) -> Result<PathBuf, TransferError> {
        ensure_supported_scheme(url)?;
        if destination_directory.as_os_str().is_empty() {
            return Err(TransferError::invalid_argument(
                "destination directory must not be empty",
            ));
        }

        let head = self.transport.fetch_headers(url).await?;
        if !head.is_success() {
            return Err(TransferError::http_status(url.as_str(), head.status.as_u16()));
        }

        let file_name = resolve_file_name(&head, url);
        let resolved = destination_directory.join(file_name);
        self.telemetry
            .info(&format!("Resolved file path: {}", resolved.display()));
        Ok(resolved)
    }

    /// Streams `url` into `destination`.
    ///
    /// The body goes to `destination` + [`PART_SUFFIX`] first, is read in
    /// chunks of at most `chunk_size` bytes, and `on_progress` sees one
    /// sample per chunk. The `.part` file is renamed onto `destination`
    /// (replacing any existing file) only after the full body is written.
    ///
    /// `cancel` is raced against every read and write; once it fires the
    /// transfer stops at that point and fails with
    /// [`TransferError::Cancelled`].
    ///
    /// On any failure the `.part` file is deleted best-effort; a failed
    /// delete is reported as a warning and never replaces the original
    /// error.
    ///
    /// # Errors
    ///
    /// - [`TransferError::InvalidArgument`] for an empty destination.
    /// - [`TransferError::HttpStatus`] / [`TransferError::Network`] for
    ///   non-success responses or body read failures.
    /// - [`TransferError::Storage`] when the `.part` file cannot be written
    ///   or renamed.
    /// - [`TransferError::Cancelled`] when `cancel` fires first.
    #[instrument(
        skip(self, on_progress, cancel),
        fields(url = %url, destination = %destination.display())
    )]
    pub async fn transfer(
        &self,
        url: &Url,
        destination: &Path,
        on_progress: Option<&mut ProgressCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        if destination.as_os_str().is_empty() {
            return Err(TransferError::invalid_argument(
                "destination path must not be empty",
            ));
        }

        let temp_path = part_path(destination);
        self.telemetry.info(&format!(
            "Starting transfer of {url} to {}",
            destination.display()
        ));

        match self
            .stream_and_publish(url, destination, &temp_path, on_progress, cancel)
            .await
        {
            Ok(report) => {
                self.telemetry.info(&format!(
                    "Successfully downloaded file to: {}",
                    report.path.display()
                ));
                Ok(report)
            }
            Err(error) => {
                if error.is_cancelled() {
                    self.telemetry
                        .warn(&format!("Transfer of {url} was cancelled"));
                } else {
                    self.telemetry
                        .error("Error occurred during download process.", &error);
                }
                self.cleanup(&temp_path).await;
                Err(error)
            }
        }
    }

    /// Fetch, stream into `temp_path`, then rename onto `destination`.
    ///
    /// The writer is dropped before this returns, so the caller can delete
    /// `temp_path` on error.
    async fn stream_and_publish(
        &self,
        url: &Url,
        destination: &Path,
        temp_path: &Path,
        mut on_progress: Option<&mut ProgressCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(url.as_str()));
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransferError::cancelled(url.as_str())),
            response = self.transport.fetch_stream(url) => response?,
        };
        if !response.head.is_success() {
            return Err(TransferError::http_status(
                url.as_str(),
                response.head.status.as_u16(),
            ));
        }

        let total_bytes = response.head.content_length();
        let mut body = response.body;
        let mut writer = self
            .store
            .create_exclusive(temp_path)
            .await
            .map_err(|e| TransferError::storage(temp_path, e))?;

        let file_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let started = Instant::now();
        let mut buffer = vec![0_u8; self.config.chunk_size];
        let mut bytes_downloaded: u64 = 0;

        loop {
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::cancelled(url.as_str())),
                read = body.read(&mut buffer) => {
                    read.map_err(|e| TransferError::network(url.as_str(), e))?
                }
            };
            if read == 0 {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::cancelled(url.as_str())),
                written = writer.write_all(&buffer[..read]) => {
                    written.map_err(|e| TransferError::storage(temp_path, e))?;
                }
            }
            bytes_downloaded += read as u64;

            if let Some(report) = on_progress.as_deref_mut() {
                report(ProgressSample {
                    file_name: file_name.clone(),
                    file_path: destination.to_path_buf(),
                    total_bytes,
                    bytes_downloaded,
                    elapsed: started.elapsed(),
                });
            }
        }

        // Ensure all data is flushed to disk before the rename
        writer
            .shutdown()
            .await
            .map_err(|e| TransferError::storage(temp_path, e))?;
        drop(writer);
        debug!(bytes = bytes_downloaded, "body fully written");

        self.store
            .rename(temp_path, destination)
            .await
            .map_err(|e| TransferError::storage(destination, e))?;

        Ok(TransferReport {
            path: destination.to_path_buf(),
            bytes_downloaded,
            total_bytes,
        })
    }

    /// Best-effort removal of the `.part` file.
    /// Best-effort removal of the `.part` sibling of `destination`, for
    /// callers whose transfer future never returned.
    pub(crate) async fn discard_partial(&self, destination: &Path) {
        self.cleanup(&part_path(destination)).await;
    }

    async fn cleanup(&self, temp_path: &Path) {
        if !self.store.exists(temp_path).await {
            return;
        }
        debug!(path = %temp_path.display(), "cleaning up partial file after error");
        if let Err(e) = self.store.delete(temp_path).await {
            self.telemetry.warn(&format!(
                "Failed to delete temporary file {}: {e}",
                temp_path.display()
            ));
        }
    }
}
