//! Quota ledger persistence.
//!
//! The rotator serializes every load-modify-save itself, so storages only
//! need plain load and save.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use tributary_core::{ProviderKind, QuotaLedger};

use crate::error::StoreError;
use crate::persistence::{load_json_if_exists, save_json};

// ============================================================================
// Ledger Storage Trait
// ============================================================================

/// Durable storage for quota ledgers.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Loads a provider's ledger; an empty ledger if none was saved yet.
    async fn load(&self, provider: ProviderKind) -> Result<QuotaLedger, StoreError>;

    /// Saves a provider's ledger.
    async fn save(&self, ledger: &QuotaLedger) -> Result<(), StoreError>;
}

// ============================================================================
// JSON File Storage
// ============================================================================

/// One JSON file per provider: `<dir>/<provider>.json`.
#[derive(Debug, Clone)]
pub struct JsonLedgerStorage {
    dir: PathBuf,
}

impl JsonLedgerStorage {
    /// Creates a storage rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a provider's ledger file.
    pub fn path(&self, provider: ProviderKind) -> PathBuf {
        self.dir.join(format!("{}.json", provider.cli_name()))
    }
}

#[async_trait]
impl LedgerStorage for JsonLedgerStorage {
    async fn load(&self, provider: ProviderKind) -> Result<QuotaLedger, StoreError> {
        let ledger = load_json_if_exists(&self.path(provider))
            .await?
            .unwrap_or_else(|| QuotaLedger::new(provider));
        Ok(ledger)
    }

    async fn save(&self, ledger: &QuotaLedger) -> Result<(), StoreError> {
        debug!(provider = %ledger.provider, credentials = ledger.credentials.len(), "Saving quota ledger");
        save_json(&self.path(ledger.provider), ledger).await
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// Process-local ledgers, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryLedgerStorage {
    ledgers: Mutex<HashMap<ProviderKind, QuotaLedger>>,
    fail_saves: AtomicBool,
}

impl MemoryLedgerStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail (simulates a broken disk).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Seeds a ledger.
    pub async fn insert(&self, ledger: QuotaLedger) {
        self.ledgers.lock().await.insert(ledger.provider, ledger);
    }
}

#[async_trait]
impl LedgerStorage for MemoryLedgerStorage {
    async fn load(&self, provider: ProviderKind) -> Result<QuotaLedger, StoreError> {
        Ok(self
            .ledgers
            .lock()
            .await
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| QuotaLedger::new(provider)))
    }

    async fn save(&self, ledger: &QuotaLedger) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "ledger storage unavailable",
            )));
        }
        self.ledgers
            .lock()
            .await
            .insert(ledger.provider, ledger.clone());
        Ok(())
    }
}
