//! Quota-aware credential rotator.
//!
//! Hands out the first credential in configured order that is neither
//! blocked nor past its soft limit, and records quota consumption after
//! each page. Usage lives in a [`QuotaLedger`] per provider, persisted via
//! a [`LedgerStorage`] so it survives restarts.
//!
//! Every operation on a provider runs under that provider's mutex and does
//! load, modify and save before releasing it, so concurrent jobs never lose
//! updates to the same credential.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use tributary_core::{
    Clock, CredentialState, CredentialUsage, LeasedCredential, ProviderKind, QuotaLedger,
};

use crate::error::StoreError;
use crate::ledger::LedgerStorage;

/// Default fraction of the daily limit at which a credential is blocked.
pub const DEFAULT_SOFT_LIMIT_RATIO: f64 = 0.9;

// ============================================================================
// Pooled Credential
// ============================================================================

/// A configured credential with its resolved token.
#[derive(Clone, PartialEq, Eq)]
pub struct PooledCredential {
    /// Stable id (ledger key).
    pub id: String,
    /// Access token.
    pub token: String,
    /// Provider-imposed daily limit.
    pub daily_limit: u64,
}

impl PooledCredential {
    /// Creates a pooled credential.
    pub fn new(id: impl Into<String>, token: impl Into<String>, daily_limit: u64) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            daily_limit,
        }
    }
}

impl std::fmt::Debug for PooledCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledCredential")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("daily_limit", &self.daily_limit)
            .finish()
    }
}

// ============================================================================
// Rotator
// ============================================================================

struct Pool {
    credentials: Vec<PooledCredential>,
    lock: Mutex<()>,
}

/// Quota-aware credential rotator.
pub struct CredentialRotator {
    storage: Arc<dyn LedgerStorage>,
    clock: Arc<dyn Clock>,
    soft_limit_ratio: f64,
    pools: HashMap<ProviderKind, Pool>,
}

impl CredentialRotator {
    /// Creates a rotator with no pools.
    pub fn new(storage: Arc<dyn LedgerStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            soft_limit_ratio: DEFAULT_SOFT_LIMIT_RATIO,
            pools: HashMap::new(),
        }
    }

    /// Sets the soft-limit ratio (clamped to `(0, 1]`).
    pub fn with_soft_limit_ratio(mut self, ratio: f64) -> Self {
        self.soft_limit_ratio = if ratio > 0.0 && ratio <= 1.0 {
            ratio
        } else {
            warn!(ratio, "Invalid soft limit ratio, using default");
            DEFAULT_SOFT_LIMIT_RATIO
        };
        self
    }

    /// Registers a provider's credentials in rotation order.
    pub fn with_pool(mut self, provider: ProviderKind, credentials: Vec<PooledCredential>) -> Self {
        self.pools.insert(
            provider,
            Pool {
                credentials,
                lock: Mutex::new(()),
            },
        );
        self
    }

    /// Registers several pools at once.
    pub fn with_pools(
        self,
        pools: impl IntoIterator<Item = (ProviderKind, Vec<PooledCredential>)>,
    ) -> Self {
        pools
            .into_iter()
            .fold(self, |rotator, (kind, creds)| rotator.with_pool(kind, creds))
    }

    /// Providers with at least one credential.
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self
            .pools
            .iter()
            .filter(|(_, p)| !p.credentials.is_empty())
            .map(|(k, _)| *k)
            .collect();
        kinds.sort();
        kinds
    }

    /// Usage at which a credential with `daily_limit` gets blocked.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn soft_limit(&self, daily_limit: u64) -> u64 {
        ((daily_limit as f64 * self.soft_limit_ratio).floor() as u64).max(1)
    }

    fn pool(&self, provider: ProviderKind) -> Result<&Pool, StoreError> {
        self.pools
            .get(&provider)
            .filter(|p| !p.credentials.is_empty())
            .ok_or(StoreError::ProviderNotConfigured(provider))
    }

    fn usage(&self, cred: &PooledCredential, state: &CredentialState) -> CredentialUsage {
        CredentialUsage {
            id: cred.id.clone(),
            used_today: state.used_today,
            daily_limit: cred.daily_limit,
            soft_limit: self.soft_limit(cred.daily_limit),
            blocked: state.blocked,
            reset_day: state.reset_day,
        }
    }

    async fn persist(&self, ledger: &mut QuotaLedger) -> Result<(), StoreError> {
        ledger.updated_at = Some(self.clock.now());
        self.storage.save(ledger).await
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Returns the first usable credential, or `None` when every credential
    /// is blocked or exhausted for today.
    ///
    /// Credentials whose day has changed are reset first. The ledger is
    /// persisted before returning.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
        provider: ProviderKind,
    ) -> Result<Option<LeasedCredential>, StoreError> {
        let pool = self.pool(provider)?;
        let _guard = pool.lock.lock().await;

        let today = self.clock.today();
        let mut ledger = self.storage.load(provider).await?;
        let mut chosen = None;

        for cred in &pool.credentials {
            let soft_limit = self.soft_limit(cred.daily_limit);
            let state = ledger.entry(&cred.id, today);

            if state.roll_over(today) {
                info!(provider = %provider, credential = %cred.id, "Daily quota reset");
            }
            if !state.blocked && state.used_today >= soft_limit {
                state.blocked = true;
            }

            if chosen.is_none() && !state.blocked {
                chosen = Some(LeasedCredential {
                    id: cred.id.clone(),
                    token: cred.token.clone(),
                    daily_limit: cred.daily_limit,
                    used_today: state.used_today,
                });
            }
        }

        self.persist(&mut ledger).await?;

        match &chosen {
            Some(lease) => debug!(credential = %lease.id, used = lease.used_today, "Credential acquired"),
            None => warn!(provider = %provider, "All credentials exhausted or blocked"),
        }
        Ok(chosen)
    }

    /// Adds consumed units to a credential and blocks it once the soft
    /// limit is reached. Returns the updated usage row.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        provider: ProviderKind,
        credential_id: &str,
        units: u64,
    ) -> Result<CredentialUsage, StoreError> {
        let pool = self.pool(provider)?;
        let cred = pool
            .credentials
            .iter()
            .find(|c| c.id == credential_id)
            .ok_or_else(|| StoreError::UnknownCredential {
                provider,
                id: credential_id.to_string(),
            })?;
        let _guard = pool.lock.lock().await;

        let today = self.clock.today();
        let soft_limit = self.soft_limit(cred.daily_limit);
        let mut ledger = self.storage.load(provider).await?;

        let state = ledger.entry(&cred.id, today);
        state.roll_over(today);
        state.used_today = state.used_today.saturating_add(units);
        if !state.blocked && state.used_today >= soft_limit {
            state.blocked = true;
            warn!(
                provider = %provider,
                credential = %cred.id,
                used = state.used_today,
                soft_limit,
                "Credential reached soft limit, blocked for today"
            );
        }
        let usage = self.usage(cred, state);

        self.persist(&mut ledger).await?;
        Ok(usage)
    }

    /// Blocks a credential for the rest of the day without changing its
    /// usage. Used when the provider itself reports the quota spent.
    #[instrument(skip(self))]
    pub async fn block(
        &self,
        provider: ProviderKind,
        credential_id: &str,
    ) -> Result<CredentialUsage, StoreError> {
        let pool = self.pool(provider)?;
        let cred = pool
            .credentials
            .iter()
            .find(|c| c.id == credential_id)
            .ok_or_else(|| StoreError::UnknownCredential {
                provider,
                id: credential_id.to_string(),
            })?;
        let _guard = pool.lock.lock().await;

        let today = self.clock.today();
        let mut ledger = self.storage.load(provider).await?;
        let state = ledger.entry(&cred.id, today);
        state.roll_over(today);
        state.blocked = true;
        let usage = self.usage(cred, state);

        self.persist(&mut ledger).await?;
        warn!(provider = %provider, credential = %cred.id, "Credential blocked by provider quota");
        Ok(usage)
    }

    /// Per-credential usage snapshot in rotation order.
    ///
    /// Read-only: a pending daily reset is reflected but not persisted.
    pub async fn status(&self, provider: ProviderKind) -> Result<Vec<CredentialUsage>, StoreError> {
        let pool = self.pool(provider)?;
        let _guard = pool.lock.lock().await;

        let today = self.clock.today();
        let ledger = self.storage.load(provider).await?;

        Ok(pool
            .credentials
            .iter()
            .map(|cred| {
                let mut state = ledger
                    .get(&cred.id)
                    .cloned()
                    .unwrap_or_else(|| CredentialState::new(today));
                state.roll_over(today);
                self.usage(cred, &state)
            })
            .collect())
    }

    /// Clears today's usage and blocks for every credential of a provider.
    pub async fn reset(&self, provider: ProviderKind) -> Result<Vec<CredentialUsage>, StoreError> {
        let pool = self.pool(provider)?;
        {
            let _guard = pool.lock.lock().await;
            let today = self.clock.today();
            let mut ledger = self.storage.load(provider).await?;
            for cred in &pool.credentials {
                ledger
                    .credentials
                    .insert(cred.id.clone(), CredentialState::new(today));
            }
            self.persist(&mut ledger).await?;
            info!(provider = %provider, "Quota ledger reset");
        }
        self.status(provider).await
    }
}

impl std::fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("soft_limit_ratio", &self.soft_limit_ratio)
            .field("providers", &self.providers())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStorage;
    use chrono::{Duration, TimeZone, Utc};
    use tributary_core::FixedClock;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn pool(limits: &[u64]) -> Vec<PooledCredential> {
        limits
            .iter()
            .enumerate()
            .map(|(i, l)| PooledCredential::new(format!("c{i}"), format!("tok{i}"), *l))
            .collect()
    }

    fn rotator(
        storage: Arc<MemoryLedgerStorage>,
        clock: Arc<FixedClock>,
        limits: &[u64],
    ) -> CredentialRotator {
        CredentialRotator::new(storage, clock).with_pool(ProviderKind::YouTube, pool(limits))
    }

    #[tokio::test]
    async fn test_first_in_order_wins() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[100, 100]);

        let lease = rotator.acquire(ProviderKind::YouTube).await.unwrap().unwrap();
        assert_eq!(lease.id, "c0");
        assert_eq!(lease.token, "tok0");
    }

    #[tokio::test]
    async fn test_record_blocks_at_soft_limit() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[100, 100]);

        let usage = rotator.record(ProviderKind::YouTube, "c0", 89).await.unwrap();
        assert!(!usage.blocked);
        assert_eq!(usage.soft_limit, 90);

        let usage = rotator.record(ProviderKind::YouTube, "c0", 1).await.unwrap();
        assert!(usage.blocked);

        let lease = rotator.acquire(ProviderKind::YouTube).await.unwrap().unwrap();
        assert_eq!(lease.id, "c1");
    }

    #[tokio::test]
    async fn test_all_blocked_is_none_not_error() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[10]);

        rotator.record(ProviderKind::YouTube, "c0", 10).await.unwrap();
        assert!(rotator.acquire(ProviderKind::YouTube).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_daily_reset() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let clock = clock();
        let rotator = rotator(storage, clock.clone(), &[100]);

        rotator.record(ProviderKind::YouTube, "c0", 100).await.unwrap();
        assert!(rotator.acquire(ProviderKind::YouTube).await.unwrap().is_none());

        clock.advance(Duration::days(1));
        let lease = rotator.acquire(ProviderKind::YouTube).await.unwrap().unwrap();
        assert_eq!(lease.used_today, 0);

        let status = rotator.status(ProviderKind::YouTube).await.unwrap();
        assert!(!status[0].blocked);
        assert_eq!(status[0].reset_day, clock.today());
    }

    #[tokio::test]
    async fn test_status_in_rotation_order() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[100, 50, 10]);
        rotator.record(ProviderKind::YouTube, "c1", 20).await.unwrap();

        let status = rotator.status(ProviderKind::YouTube).await.unwrap();
        let ids: Vec<_> = status.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["c0", "c1", "c2"]);
        assert_eq!(status[1].used_today, 20);
        assert_eq!(status[1].remaining(), 30);
    }

    #[tokio::test]
    async fn test_reset_clears_usage() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[10]);
        rotator.record(ProviderKind::YouTube, "c0", 10).await.unwrap();

        let status = rotator.reset(ProviderKind::YouTube).await.unwrap();
        assert_eq!(status[0].used_today, 0);
        assert!(!status[0].blocked);
        assert!(rotator.acquire(ProviderKind::YouTube).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_block_skips_credential() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[1000, 1000]);

        let usage = rotator.block(ProviderKind::YouTube, "c0").await.unwrap();
        assert!(usage.blocked);
        assert_eq!(usage.used_today, 0);

        let lease = rotator.acquire(ProviderKind::YouTube).await.unwrap().unwrap();
        assert_eq!(lease.id, "c1");
    }

    #[tokio::test]
    async fn test_unconfigured_and_unknown() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage, clock(), &[10]);

        assert!(matches!(
            rotator.acquire(ProviderKind::GitHub).await,
            Err(StoreError::ProviderNotConfigured(ProviderKind::GitHub))
        ));
        assert!(matches!(
            rotator.record(ProviderKind::YouTube, "ghost", 1).await,
            Err(StoreError::UnknownCredential { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = Arc::new(rotator(storage, clock(), &[1_000_000]));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let r = rotator.clone();
            handles.push(tokio::spawn(async move {
                r.record(ProviderKind::YouTube, "c0", 3).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let status = rotator.status(ProviderKind::YouTube).await.unwrap();
        assert_eq!(status[0].used_today, 150);
    }

    #[tokio::test]
    async fn test_ledger_save_failure_surfaces() {
        let storage = Arc::new(MemoryLedgerStorage::new());
        let rotator = rotator(storage.clone(), clock(), &[10]);
        storage.fail_saves(true);
        assert!(rotator.acquire(ProviderKind::YouTube).await.is_err());
        assert!(rotator.record(ProviderKind::YouTube, "c0", 1).await.is_err());
    }

    #[test]
    fn test_soft_limit_rounding() {
        let rotator = CredentialRotator::new(Arc::new(MemoryLedgerStorage::new()), clock());
        assert_eq!(rotator.soft_limit(100), 90);
        assert_eq!(rotator.soft_limit(10_000), 9_000);
        assert_eq!(rotator.soft_limit(1), 1);

        let strict = CredentialRotator::new(Arc::new(MemoryLedgerStorage::new()), clock())
            .with_soft_limit_ratio(1.0);
        assert_eq!(strict.soft_limit(100), 100);
    }

    #[test]
    fn test_pooled_credential_debug_redacts() {
        let cred = PooledCredential::new("a", "super-secret", 1);
        assert!(!format!("{cred:?}").contains("super-secret"));
    }
}
