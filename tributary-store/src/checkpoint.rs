//! Sync checkpoint persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tributary_core::{ProviderKind, SyncCheckpoint};

use crate::error::StoreError;
use crate::persistence::{load_json_if_exists, save_json};

/// Durable storage for per-provider checkpoints.
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Loads a provider's checkpoint, if one was ever saved.
    async fn load(&self, provider: ProviderKind) -> Result<Option<SyncCheckpoint>, StoreError>;

    /// Saves a provider's checkpoint.
    async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), StoreError>;

    /// Loads every saved checkpoint.
    async fn all(&self) -> Result<Vec<SyncCheckpoint>, StoreError>;
}

// ============================================================================
// JSON File Storage
// ============================================================================

/// All checkpoints in one JSON object keyed by provider CLI name.
#[derive(Debug)]
pub struct JsonCheckpointStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCheckpointStorage {
    /// Creates a storage backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, SyncCheckpoint>, StoreError> {
        Ok(load_json_if_exists(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl CheckpointStorage for JsonCheckpointStorage {
    async fn load(&self, provider: ProviderKind) -> Result<Option<SyncCheckpoint>, StoreError> {
        Ok(self.read_all().await?.remove(provider.cli_name()))
    }

    async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(
            checkpoint.provider.cli_name().to_string(),
            checkpoint.clone(),
        );
        save_json(&self.path, &all).await
    }

    async fn all(&self) -> Result<Vec<SyncCheckpoint>, StoreError> {
        Ok(self.read_all().await?.into_values().collect())
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// Process-local checkpoints, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStorage {
    checkpoints: Mutex<HashMap<ProviderKind, SyncCheckpoint>>,
    fail_saves: AtomicBool,
}

impl MemoryCheckpointStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointStorage for MemoryCheckpointStorage {
    async fn load(&self, provider: ProviderKind) -> Result<Option<SyncCheckpoint>, StoreError> {
        Ok(self.checkpoints.lock().await.get(&provider).cloned())
    }

    async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "checkpoint storage unavailable",
            )));
        }
        self.checkpoints
            .lock()
            .await
            .insert(checkpoint.provider, checkpoint.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<SyncCheckpoint>, StoreError> {
        let mut all: Vec<_> = self.checkpoints.lock().await.values().cloned().collect();
        all.sort_by_key(|c| c.provider);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_core::RunStatus;

    #[tokio::test]
    async fn test_json_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonCheckpointStorage::new(dir.path().join("checkpoints.json"));

        assert!(storage.load(ProviderKind::GitHub).await.unwrap().is_none());

        let mut cp = SyncCheckpoint::new(ProviderKind::GitHub);
        cp.cursor = Some(r#"{"page":3}"#.to_string());
        cp.last_run_status = Some(RunStatus::Partial);
        storage.save(&cp).await.unwrap();
        storage
            .save(&SyncCheckpoint::new(ProviderKind::YouTube))
            .await
            .unwrap();

        let loaded = storage.load(ProviderKind::GitHub).await.unwrap().unwrap();
        assert_eq!(loaded.cursor.as_deref(), Some(r#"{"page":3}"#));
        assert_eq!(loaded.last_run_status, Some(RunStatus::Partial));
        assert_eq!(storage.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_failure_injection() {
        let storage = MemoryCheckpointStorage::new();
        storage.fail_saves(true);
        assert!(
            storage
                .save(&SyncCheckpoint::new(ProviderKind::Airtable))
                .await
                .is_err()
        );
        assert!(storage.load(ProviderKind::Airtable).await.unwrap().is_none());
    }
}
