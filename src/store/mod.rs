//! Filesystem capability consumed by the transfer engine.
//!
//! The engine never touches `std::fs`/`tokio::fs` directly. Every create,
//! rename and delete goes through [`FileStore`], which lets tests drive the
//! engine against an in-memory or fault-injecting double.

mod local;

pub use local::LocalFileStore;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Writable handle returned by [`FileStore::create_exclusive`].
pub type WriteHandle = Box<dyn AsyncWrite + Send + Unpin>;

/// Filesystem primitives needed to stream into a temp file and publish it.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Returns whether a file exists at `path`. Errors read as "absent".
    async fn exists(&self, path: &Path) -> bool;

    /// Deletes the file at `path`.
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Opens `path` for writing, creating or truncating it.
    ///
    /// The returned handle must be the only writer on that path until it is
    /// dropped.
    async fn create_exclusive(&self, path: &Path) -> io::Result<WriteHandle>;

    /// Moves `from` onto `to`, replacing any existing file at `to`.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Creates `path` and any missing parents. No-op when it already exists.
    async fn ensure_directory(&self, path: &Path) -> io::Result<()>;
}
