// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Tributary Store
//!
//! Durable state for the Tributary sync engine.
//!
//! This crate provides:
//!
//! - **CredentialRotator**: Quota-aware credential selection over a persisted ledger
//! - **CheckpointStorage**: Per-provider cursors and failure counters
//! - **SqliteContentStore**: The unified content table with field-level merge
//! - **JobHistory**: Bounded log of finished sync jobs
//! - **Config**: YAML/JSON configuration with credential resolution
//! - **Persistence**: Atomic JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tributary_core::{ProviderKind, SystemClock};
//! use tributary_store::{Config, CredentialRotator, JsonLedgerStorage};
//!
//! let config = Config::load()?;
//! let rotator = CredentialRotator::new(
//!     Arc::new(JsonLedgerStorage::new(config.ledger_dir())),
//!     Arc::new(SystemClock),
//! )
//! .with_pools(pools);
//!
//! if let Some(lease) = rotator.acquire(ProviderKind::YouTube).await? {
//!     // fetch a page with lease.token, then:
//!     rotator.record(ProviderKind::YouTube, &lease.id, 100).await?;
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod content;
pub mod error;
pub mod history;
pub mod ledger;
pub mod persistence;
pub mod rotator;

pub use checkpoint::{CheckpointStorage, JsonCheckpointStorage, MemoryCheckpointStorage};
pub use config::{
    CacheConfig, Config, CredentialConfig, GeneralConfig, ProviderConfig, StoreConfig, SyncConfig,
};
pub use content::{MemoryContentStore, SqliteContentStore};
pub use error::StoreError;
pub use history::{JobHistory, MAX_HISTORY_ENTRIES};
pub use ledger::{JsonLedgerStorage, LedgerStorage, MemoryLedgerStorage};
pub use persistence::{
    default_config_dir, default_config_path, default_data_dir, load_json, load_json_if_exists,
    save_json,
};
pub use rotator::{CredentialRotator, DEFAULT_SOFT_LIMIT_RATIO, PooledCredential};
