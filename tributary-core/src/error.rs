//! Core error types for Tributary.

use thiserror::Error;

/// Core error type for Tributary operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Provider not found or not configured.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data in a record or payload.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The content store rejected a write for a reason other than the
    /// expected `(provider, native id)` conflict.
    #[error("Content store write failed: {0}")]
    StoreWrite(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
