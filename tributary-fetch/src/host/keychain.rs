//! Credential tokens held in the OS keychain.
//!
//! A credential whose config names a `keychain_account` reads its token from
//! the entry `tributary:<provider>` / `<account>` (Keychain Services on macOS,
//! Credential Manager on Windows, Secret Service on Linux).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};
use tributary_core::ProviderKind;

use crate::error::KeychainError;

/// Prefix of every keychain service name.
const SERVICE_PREFIX: &str = "tributary";

/// Keychain service name for a provider.
pub fn service_name(provider: ProviderKind) -> String {
    format!("{SERVICE_PREFIX}:{}", provider.cli_name())
}

// ============================================================================
// Keychain API Trait
// ============================================================================

/// Read access to stored provider tokens.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Looks up the token stored for `account` under `provider`.
    ///
    /// `Ok(None)` means there is no entry (or it is empty); errors are
    /// reserved for an unreachable or denied keychain.
    async fn token(
        &self,
        provider: ProviderKind,
        account: &str,
    ) -> Result<Option<String>, KeychainError>;
}

// ============================================================================
// System Keychain
// ============================================================================

/// Keychain backed by the platform store via `keyring`.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain handle.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn token(
        &self,
        provider: ProviderKind,
        account: &str,
    ) -> Result<Option<String>, KeychainError> {
        let service = service_name(provider);
        let entry = Entry::new(&service, account)
            .map_err(|e| KeychainError::Platform(e.to_string()))?;

        // keyring is blocking; lookups happen once per provider at startup
        match entry.get_password() {
            Ok(secret) if !secret.trim().is_empty() => Ok(Some(secret.trim().to_string())),
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!(%service, account, "No keychain entry");
                Ok(None)
            }
            Err(e) => {
                warn!(%service, account, error = %e, "Keychain lookup failed");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// In-Memory Keychain
// ============================================================================

/// Process-local tokens, for tests and headless hosts without a keychain.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    tokens: Mutex<HashMap<(ProviderKind, String), String>>,
}

impl MemoryKeychain {
    /// Creates an empty keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keychain holding `(provider, account, token)` rows.
    pub fn with_tokens<'a>(
        rows: impl IntoIterator<Item = (ProviderKind, &'a str, &'a str)>,
    ) -> Self {
        let tokens = rows
            .into_iter()
            .map(|(provider, account, token)| ((provider, account.to_string()), token.to_string()))
            .collect();
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    async fn token(
        &self,
        provider: ProviderKind,
        account: &str,
    ) -> Result<Option<String>, KeychainError> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| KeychainError::Unavailable("memory keychain poisoned".to_string()))?;
        Ok(tokens.get(&(provider, account.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name() {
        assert_eq!(service_name(ProviderKind::YouTube), "tributary:youtube");
        assert_eq!(service_name(ProviderKind::Mailchimp), "tributary:mailchimp");
    }

    #[tokio::test]
    async fn test_memory_keychain_lookup() {
        let keychain = MemoryKeychain::with_tokens([(ProviderKind::YouTube, "primary", "yt-key")]);

        assert_eq!(
            keychain.token(ProviderKind::YouTube, "primary").await.unwrap().as_deref(),
            Some("yt-key")
        );
        assert!(keychain.token(ProviderKind::YouTube, "backup").await.unwrap().is_none());
        assert!(keychain.token(ProviderKind::GitHub, "primary").await.unwrap().is_none());
    }
}
