//! Store error types.

use thiserror::Error;
use tributary_core::{CoreError, ProviderKind};

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Provider has no credential pool configured.
    #[error("No credentials configured for {0}")]
    ProviderNotConfigured(ProviderKind),

    /// Credential id is not part of the provider's pool.
    #[error("Unknown credential `{id}` for {provider}")]
    UnknownCredential {
        /// Provider the lookup was for.
        provider: ProviderKind,
        /// Credential id.
        id: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Blocking task failed or a lock was poisoned.
    #[error("Background task failed: {0}")]
    Task(String),

    /// Timeout error.
    #[error("Operation timed out")]
    Timeout,

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout | StoreError::Io(_) => true,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::StoreWrite(err.to_string())
    }
}
