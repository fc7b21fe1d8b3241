//! Registry of in-flight transfers.
//!
//! [`TransferRegistry::start`] resolves the destination, registers the
//! transfer under a fresh [`TransferId`] and spawns it on its own tokio task.
//! The entry lives exactly as long as the transfer is `Resolving` or
//! `Streaming`: a guard owned by the task removes it on every exit path,
//! panics included.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::transfer::{
    ProgressCallback, TransferEngine, TransferError, TransferReport, TransferState,
    ensure_supported_scheme,
};

/// Owned progress sink handed to a spawned transfer.
pub type ProgressSink = Box<ProgressCallback<'static>>;

/// Opaque identifier of one transfer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Snapshot of one registered transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTransfer {
    pub id: TransferId,
    pub url: Url,
    pub resolved_path: PathBuf,
}

/// How a transfer ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The whole body was published at the destination.
    Completed(TransferReport),
    /// The transfer was cancelled; no file was left behind.
    Cancelled,
}

struct TransferEntry {
    url: Url,
    resolved_path: PathBuf,
    cancel: CancellationToken,
    /// Fires once the entry has been removed.
    done: CancellationToken,
}

/// Caller's view of a started transfer.
#[derive(Debug)]
pub struct TransferHandle {
    id: TransferId,
    url: Url,
    resolved_path: PathBuf,
    state: watch::Receiver<TransferState>,
    task: JoinHandle<Result<TransferOutcome, TransferError>>,
}

impl TransferHandle {
    #[must_use]
    pub fn id(&self) -> TransferId {
        self.id
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransferState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TransferState> {
        self.state.clone()
    }

    /// Waits for the transfer to end.
    ///
    /// The registry entry is already gone when this returns. Cancellation is
    /// reported as `Ok(TransferOutcome::Cancelled)`.
    ///
    /// # Errors
    ///
    /// Returns the transfer's failure, or [`TransferError::TaskAborted`] if
    /// the task panicked or was aborted.
    pub async fn wait(self) -> Result<TransferOutcome, TransferError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(TransferError::TaskAborted {
                id: self.id,
                reason: join_error.to_string(),
            }),
        }
    }
}

/// Removes the registry entry and publishes the final state when the task
/// ends, however it ends.
struct EntryGuard {
    entries: Arc<DashMap<TransferId, TransferEntry>>,
    id: TransferId,
    done: CancellationToken,
    state: watch::Sender<TransferState>,
    final_state: Option<TransferState>,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.id);
        self.state
            .send_replace(self.final_state.unwrap_or(TransferState::Failed));
        self.done.cancel();
    }
}

/// Platform download folder: `$HOME/Downloads`, `%USERPROFILE%\Downloads`,
/// else the current directory.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|var| std::env::var_os(var).filter(|value| !value.is_empty()))
        .map_or_else(
            || PathBuf::from("."),
            |home| PathBuf::from(home).join("Downloads"),
        )
}

/// Anchors a relative directory at the current working directory so resolved
/// paths are always absolute.
fn absolute_dir(dir: &Path) -> Result<PathBuf, TransferError> {
    std::path::absolute(dir).map_err(|e| TransferError::storage(dir, e))
}

/// Tracks every in-flight transfer. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TransferRegistry {
    engine: Arc<TransferEngine>,
    entries: Arc<DashMap<TransferId, TransferEntry>>,
    default_dir: PathBuf,
}

impl fmt::Debug for TransferRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRegistry")
            .field("active", &self.entries.len())
            .field("default_dir", &self.default_dir)
            .finish_non_exhaustive()
    }
}

impl TransferRegistry {
    /// Creates a registry that falls back to [`default_download_dir`].
    #[must_use]
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self {
            engine,
            entries: Arc::new(DashMap::new()),
            default_dir: default_download_dir(),
        }
    }

    /// Overrides the directory used when `start` gets none.
    #[must_use]
    pub fn with_default_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_dir = dir.into();
        self
    }

    #[must_use]
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<TransferEngine> {
        &self.engine
    }

    /// Resolves the destination and launches a transfer.
    ///
    /// Returns once the task is spawned; use [`TransferHandle::wait`] for the
    /// outcome.
    ///
    /// # Errors
    ///
    /// - [`TransferError::UnsupportedScheme`] before anything else happens.
    /// - [`TransferError::InvalidArgument`] for an empty directory.
    /// - [`TransferError::Storage`] if the directory cannot be created.
    /// - Any resolution error from [`TransferEngine::resolve_destination`].
    /// - [`TransferError::RegistrationConflict`] if the new id is taken.
    #[instrument(skip(self, on_progress), fields(url = %url))]
    pub async fn start(
        &self,
        url: &Url,
        destination_directory: Option<&Path>,
        on_progress: Option<ProgressSink>,
    ) -> Result<TransferHandle, TransferError> {
        ensure_supported_scheme(url)?;
        let dir = destination_directory.map_or_else(|| self.default_dir.clone(), Path::to_path_buf);
        if dir.as_os_str().is_empty() {
            return Err(TransferError::invalid_argument(
                "destination directory must not be empty",
            ));
        }
        let dir = absolute_dir(&dir)?;

        let resolved_path = match self.prepare(url, &dir).await {
            Ok(path) => path,
            Err(error) => {
                self.engine
                    .telemetry()
                    .error("Error occurred during download process.", &error);
                return Err(error);
            }
        };
        self.launch(url.clone(), resolved_path, on_progress)
    }

    async fn prepare(&self, url: &Url, dir: &Path) -> Result<PathBuf, TransferError> {
        self.engine
            .store()
            .ensure_directory(dir)
            .await
            .map_err(|e| TransferError::storage(dir, e))?;
        self.engine.resolve_destination(url, dir).await
    }

    fn launch(
        &self,
        url: Url,
        resolved_path: PathBuf,
        on_progress: Option<ProgressSink>,
    ) -> Result<TransferHandle, TransferError> {
        let id = TransferId::new();
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        match self.entries.entry(id) {
            Entry::Occupied(_) => return Err(TransferError::RegistrationConflict { id }),
            Entry::Vacant(slot) => {
                slot.insert(TransferEntry {
                    url: url.clone(),
                    resolved_path: resolved_path.clone(),
                    cancel: cancel.clone(),
                    done: done.clone(),
                });
            }
        }

        let (state_tx, state_rx) = watch::channel(TransferState::Resolving);
        let mut guard = EntryGuard {
            entries: Arc::clone(&self.entries),
            id,
            done,
            state: state_tx,
            final_state: None,
        };
        let engine = Arc::clone(&self.engine);
        let task_url = url.clone();
        let task_path = resolved_path.clone();

        let task = tokio::spawn(async move {
            let mut on_progress = on_progress;
            guard.state.send_replace(TransferState::Streaming);

            let result = AssertUnwindSafe(engine.transfer(
                &task_url,
                &task_path,
                on_progress.as_deref_mut(),
                &cancel,
            ))
            .catch_unwind()
            .await;
            let result = match result {
                Ok(result) => result,
                Err(panic) => {
                    engine
                        .telemetry()
                        .warn(&format!("Transfer task for {task_url} panicked"));
                    engine.discard_partial(&task_path).await;
                    std::panic::resume_unwind(panic);
                }
            };
            let (state, outcome) = match result {
                Ok(report) => (
                    TransferState::Completed,
                    Ok(TransferOutcome::Completed(report)),
                ),
                Err(error) if error.is_cancelled() => {
                    (TransferState::Cancelled, Ok(TransferOutcome::Cancelled))
                }
                Err(error) => (TransferState::Failed, Err(error)),
            };
            guard.final_state = Some(state);
            drop(guard);
            outcome
        });

        self.engine
            .telemetry()
            .info(&format!("Started transfer {id} for {url}"));
        Ok(TransferHandle {
            id,
            url,
            resolved_path,
            state: state_rx,
            task,
        })
    }

    /// Signals cancellation and returns without waiting for the transfer to
    /// stop.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NotFound`] if `id` is not in flight.
    pub fn cancel(&self, id: TransferId) -> Result<(), TransferError> {
        let Some(entry) = self.entries.get(&id) else {
            self.engine
                .telemetry()
                .warn(&format!("No active download found with ID: {id}"));
            return Err(TransferError::not_found(id));
        };
        entry.cancel.cancel();
        self.engine
            .telemetry()
            .info(&format!("Cancellation requested for transfer {id}"));
        Ok(())
    }

    /// Cancels `id`, waits for it to end, then starts it again from byte zero
    /// under a new id in the same directory.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NotFound`] if `id` is not in flight, or any
    /// error [`start`](Self::start) can return.
    pub async fn resume(
        &self,
        id: TransferId,
        on_progress: Option<ProgressSink>,
    ) -> Result<TransferHandle, TransferError> {
        let (url, resolved_path, done) = {
            let Some(entry) = self.entries.get(&id) else {
                return Err(TransferError::not_found(id));
            };
            entry.cancel.cancel();
            (entry.url.clone(), entry.resolved_path.clone(), entry.done.clone())
        };
        done.cancelled().await;

        self.engine
            .telemetry()
            .info(&format!("Restarting transfer {id} for {url}"));
        let dir = resolved_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        self.start(&url, dir, on_progress).await
    }

    /// Whether `id` is in flight.
    #[must_use]
    pub fn contains(&self, id: TransferId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every in-flight transfer, in no particular order.
    #[must_use]
    pub fn active(&self) -> Vec<ActiveTransfer> {
        self.entries
            .iter()
            .map(|entry| ActiveTransfer {
                id: *entry.key(),
                url: entry.url.clone(),
                resolved_path: entry.resolved_path.clone(),
            })
            .collect()
    }

    /// Signals every in-flight transfer; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let mut signalled = 0;
        for entry in self.entries.iter() {
            entry.cancel.cancel();
            signalled += 1;
        }
        signalled
    }
}
