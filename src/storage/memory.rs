//! In-memory storage for bounded test-mode runs.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::SnapshotStore;

/// Snapshot store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }

    /// Copy of the currently held snapshot.
    pub fn current(&self) -> Option<Snapshot> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| AppError::store("memory store lock poisoned"))?;
        Ok(slot.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AppError::store("memory store lock poisoned"))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_empty_then_saved() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let snapshot = Snapshot::new("text", Utc::now());
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snapshot.clone()));
        assert_eq!(store.current(), Some(snapshot));
    }
}
