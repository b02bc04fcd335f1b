//! Credential quota state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::provider::ProviderKind;

// ============================================================================
// Credential State
// ============================================================================

/// Persisted daily usage of one credential.
///
/// Tokens are never part of this state; only the credential id is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialState {
    /// Units consumed since `reset_day` began.
    pub used_today: u64,
    /// The calendar day `used_today` applies to.
    pub reset_day: NaiveDate,
    /// Whether the credential has been withdrawn from rotation for today.
    pub blocked: bool,
}

impl CredentialState {
    /// Fresh state for `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            used_today: 0,
            reset_day: today,
            blocked: false,
        }
    }

    /// Resets the counter and unblocks if the day has changed.
    ///
    /// Returns `true` when a reset happened. Calling this again on the same
    /// day is a no-op, so the reset occurs exactly once per day change.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.reset_day == today {
            return false;
        }
        self.used_today = 0;
        self.blocked = false;
        self.reset_day = today;
        true
    }
}

// ============================================================================
// Quota Ledger
// ============================================================================

/// Usage of every credential configured for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaLedger {
    /// Provider this ledger belongs to.
    pub provider: ProviderKind,
    /// Credential id to state.
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialState>,
    /// Last time the ledger was written.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QuotaLedger {
    /// Creates an empty ledger.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            credentials: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Returns the state for `id`, creating a fresh one for `today` if the
    /// credential has never been seen.
    pub fn entry(&mut self, id: &str, today: NaiveDate) -> &mut CredentialState {
        self.credentials
            .entry(id.to_string())
            .or_insert_with(|| CredentialState::new(today))
    }

    /// Returns the state for `id` if tracked.
    pub fn get(&self, id: &str) -> Option<&CredentialState> {
        self.credentials.get(id)
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// One row of a provider's quota status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUsage {
    /// Credential id.
    pub id: String,
    /// Units consumed today.
    pub used_today: u64,
    /// Provider-imposed daily limit.
    pub daily_limit: u64,
    /// Usage at which the credential is blocked preemptively.
    pub soft_limit: u64,
    /// Whether the credential is out of rotation.
    pub blocked: bool,
    /// Day the counter applies to.
    pub reset_day: NaiveDate,
}

impl CredentialUsage {
    /// Units left before the hard limit.
    pub fn remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.used_today)
    }

    /// Usage as a percentage of the daily limit.
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_used(&self) -> f64 {
        if self.daily_limit == 0 {
            return 100.0;
        }
        (self.used_today as f64 / self.daily_limit as f64) * 100.0
    }
}

/// A credential handed out by the rotator for the duration of a job.
#[derive(Clone, PartialEq, Eq)]
pub struct LeasedCredential {
    /// Credential id (the ledger key).
    pub id: String,
    /// Access token.
    pub token: String,
    /// Provider-imposed daily limit.
    pub daily_limit: u64,
    /// Usage at the moment the lease was granted.
    pub used_today: u64,
}

impl fmt::Debug for LeasedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedCredential")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("daily_limit", &self.daily_limit)
            .field("used_today", &self.used_today)
            .finish()
    }
}
