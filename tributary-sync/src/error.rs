//! Sync error types.
//!
//! Only conditions that must reach the caller live here. Quota exhaustion,
//! provider failures and per-record write errors end up on the
//! [`SyncJob`](tributary_core::SyncJob) instead.

use thiserror::Error;
use tributary_core::ProviderKind;
use tributary_store::StoreError;

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No adapter is registered for the provider.
    #[error("No adapter registered for {0}")]
    NotConfigured(ProviderKind),

    /// The orchestrator is missing a required dependency.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// A checkpoint or ledger could not be read or written.
    ///
    /// The job is aborted; continuing could lose or double-count state.
    #[error("Persistence failed for {provider}: {source}")]
    Persistence {
        /// Provider whose job was aborted.
        provider: ProviderKind,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Wraps a store error for `provider`.
    pub fn persistence(provider: ProviderKind, source: StoreError) -> Self {
        Self::Persistence { provider, source }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Persistence { source, .. } => source.is_transient(),
            Self::NotConfigured(_) | Self::InvalidConfig(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_message_names_provider() {
        let err = SyncError::persistence(
            ProviderKind::GitHub,
            StoreError::Io(std::io::Error::other("disk full")),
        );
        let msg = err.to_string();
        assert!(msg.contains("github"));
        assert!(msg.contains("disk full"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_not_configured_is_permanent() {
        assert!(!SyncError::NotConfigured(ProviderKind::YouTube).is_transient());
    }
}
