//! Local filesystem storage implementation.
//!
//! Each save writes the full record to a hidden temp file next to the target,
//! flushes it to disk, then renames it over the target. A crash at any point
//! leaves either the old record or the new one readable, never a mix.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── snapshots/
//!     ├── {key}.json         # Current record
//!     └── .{key}.json.tmp    # In-flight write (removed on next load)
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{RECORD_VERSION, SnapshotRecord, SnapshotStore};
use crate::utils::url_key;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    url: String,
    path: PathBuf,
    tmp_path: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage for `url` rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        let url = url.into();
        let dir = root_dir.into().join("snapshots");
        let key = url_key(&url);
        Self {
            path: dir.join(format!("{key}.json")),
            tmp_path: dir.join(format!(".{key}.json.tmp")),
            url,
        }
    }

    /// Path of the snapshot record.
    pub fn location(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, sync, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let mut file = tokio::fs::File::create(&self.tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        self.sync_dir().await;
        Ok(())
    }

    /// Persist the rename itself.
    #[cfg(unix)]
    async fn sync_dir(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let synced = match tokio::fs::File::open(parent).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            log::debug!("Directory sync failed for {}: {}", parent.display(), e);
        }
    }

    /// Directories cannot be opened for syncing here; the rename is still atomic.
    #[cfg(not(unix))]
    async fn sync_dir(&self) {}

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Drop a temp file left behind by an interrupted save.
    async fn remove_stale_tmp(&self) {
        match tokio::fs::remove_file(&self.tmp_path).await {
            Ok(()) => log::warn!(
                "Removed incomplete snapshot write {}",
                self.tmp_path.display()
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Could not remove stale temp file {}: {}",
                self.tmp_path.display(),
                e
            ),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn load(&self) -> Result<Option<Snapshot>> {
        self.remove_stale_tmp().await;

        let Some(bytes) = self.read_bytes().await? else {
            log::info!("No snapshot found at {}", self.path.display());
            return Ok(None);
        };

        let record: SnapshotRecord = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::store(format!(
                "corrupt snapshot record {}: {} (delete it to start over)",
                self.path.display(),
                e
            ))
        })?;

        if record.version > RECORD_VERSION {
            return Err(AppError::store(format!(
                "snapshot record {} has unsupported version {}",
                self.path.display(),
                record.version
            )));
        }
        if record.url != self.url {
            log::warn!(
                "Snapshot at {} belongs to {}, ignoring it",
                self.path.display(),
                record.url
            );
            return Ok(None);
        }
        if !record.snapshot.verify() {
            return Err(AppError::store(format!(
                "snapshot record {} failed its fingerprint check (delete it to start over)",
                self.path.display()
            )));
        }

        Ok(Some(record.snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let record = SnapshotRecord::new(self.url.clone(), snapshot.clone());
        let bytes = serde_json::to_vec_pretty(&record)?;
        self.write_bytes(&bytes).await?;
        log::debug!("Snapshot saved to {}", self.path.display());
        Ok(())
    }
}
