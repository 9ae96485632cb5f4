//! Storage abstractions for snapshot persistence.
//!
//! One record per monitored URL, replaced atomically on every accepted
//! change.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! └── snapshots/
//!     └── example.com-1a2b3c4d5e6f.json   # {host}-{sha256(url)[..12]}
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Current on-disk record format.
pub const RECORD_VERSION: u32 = 1;

/// Persisted form of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Record format version
    pub version: u32,
    /// URL the snapshot belongs to
    pub url: String,
    pub snapshot: Snapshot,
}

impl SnapshotRecord {
    pub fn new(url: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            version: RECORD_VERSION,
            url: url.into(),
            snapshot,
        }
    }
}

/// Trait for snapshot storage backends.
///
/// Only the monitor loop calls `save`, so implementations need no locking
/// beyond making each replacement atomic.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the persisted snapshot; `None` on first run.
    async fn load(&self) -> Result<Option<Snapshot>>;

    /// Atomically replace the persisted snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}
