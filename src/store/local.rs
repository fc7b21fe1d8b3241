//! [`FileStore`] backed by the local filesystem.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, instrument};

use super::{FileStore, WriteHandle};

/// Local-disk implementation of [`FileStore`] using `tokio::fs`.
///
/// Exclusive writers take an advisory lock (`fs2`) on the opened file, so a
/// second writer on the same `.part` path fails instead of interleaving
/// bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStore;

impl LocalFileStore {
    /// Creates a store rooted at the real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    async fn create_exclusive(&self, path: &Path) -> io::Result<WriteHandle> {
        let owned = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || open_locked(&owned))
            .await
            .map_err(io::Error::other)??;
        debug!("opened exclusive writer");
        Ok(Box::new(tokio::fs::File::from_std(file)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn ensure_directory(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }
}

/// Opens without truncating, locks, then truncates, so a contended open
/// never clobbers another writer's bytes.
fn open_locked(path: &Path) -> io::Result<std::fs::File> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    FileExt::try_lock_exclusive(&file)?;
    file.set_len(0)?;
    Ok(file)
}
