//! Sync jobs and checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::provider::ProviderKind;

// ============================================================================
// Modes and States
// ============================================================================

/// How a sync job chooses its starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Start from the provider's beginning-of-history cursor.
    Full,
    /// Resume from the stored checkpoint.
    #[default]
    Incremental,
    /// Incremental, but ignores the failure back-off.
    Forced,
}

impl SyncMode {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Forced => "forced",
        }
    }

    /// Whether the job resumes from the stored checkpoint.
    pub fn resumes(&self) -> bool {
        !matches!(self, Self::Full)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            "forced" | "force" => Ok(Self::Forced),
            other => Err(format!("unknown sync mode: {other}")),
        }
    }
}

/// Lifecycle of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, not yet running.
    #[default]
    Pending,
    /// Holding the provider lock.
    Running,
    /// Finished normally.
    Succeeded,
    /// Finished with an unrecovered condition.
    Failed,
}

impl JobState {
    /// Whether the job has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Outcome of the last run, as stored in the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every page was processed.
    Success,
    /// The run failed before completing any page.
    Failure,
    /// Some pages were processed before the run stopped.
    Partial,
}

/// Why a job ended as `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// No credential had quota left.
    QuotaExhausted,
    /// The provider kept failing after retries.
    ProviderError(String),
    /// A checkpoint or ledger write failed.
    PersistenceError(String),
}

impl FailureReason {
    /// Quota exhaustion is an expected "try later" result, not an operator-facing error.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExhausted => f.write_str("quota_exhausted"),
            Self::ProviderError(msg) => write!(f, "provider_error: {msg}"),
            Self::PersistenceError(msg) => write!(f, "persistence_error: {msg}"),
        }
    }
}

// ============================================================================
// Sync Job
// ============================================================================

/// Per-job record counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobCounts {
    /// Raw records returned by the provider.
    pub fetched: u64,
    /// Records written to the store (inserted or updated).
    pub upserted: u64,
    /// Of `upserted`, how many were new keys.
    pub inserted: u64,
    /// Records that could not be mapped.
    pub skipped: u64,
    /// Records the store rejected.
    pub errored: u64,
}

impl JobCounts {
    /// Adds another set of counters to this one.
    pub fn absorb(&mut self, other: &JobCounts) {
        self.fetched += other.fetched;
        self.upserted += other.upserted;
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.errored += other.errored;
    }
}

/// One sync run for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Unique job id.
    pub id: Uuid,
    /// Provider being synced.
    pub provider: ProviderKind,
    /// Requested mode.
    pub mode: SyncMode,
    /// Current state.
    pub state: JobState,
    /// When the job was created.
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Record counters.
    #[serde(default)]
    pub counts: JobCounts,
    /// Pages processed.
    #[serde(default)]
    pub pages: u32,
    /// Pages served from the cache.
    #[serde(default)]
    pub cached_pages: u32,
    /// Quota units charged to credentials.
    #[serde(default)]
    pub units_consumed: u64,
    /// Credentials used, in order.
    #[serde(default)]
    pub credentials_used: Vec<String>,
    /// Failure reason, if `Failed`.
    #[serde(default)]
    pub reason: Option<FailureReason>,
    /// Cursor the job started from.
    #[serde(default)]
    pub checkpoint_before: Option<String>,
    /// Cursor persisted when the job ended.
    #[serde(default)]
    pub checkpoint_after: Option<String>,
}

impl SyncJob {
    /// Creates a pending job.
    pub fn new(provider: ProviderKind, mode: SyncMode, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            mode,
            state: JobState::Pending,
            started_at,
            finished_at: None,
            counts: JobCounts::default(),
            pages: 0,
            cached_pages: 0,
            units_consumed: 0,
            credentials_used: Vec::new(),
            reason: None,
            checkpoint_before: None,
            checkpoint_after: None,
        }
    }

    /// Marks the job succeeded.
    pub fn succeed(&mut self, at: DateTime<Utc>) {
        self.state = JobState::Succeeded;
        self.reason = None;
        self.finished_at = Some(at);
    }

    /// Marks the job failed.
    pub fn fail(&mut self, reason: FailureReason, at: DateTime<Utc>) {
        self.state = JobState::Failed;
        self.reason = Some(reason);
        self.finished_at = Some(at);
    }

    /// Wall time the job took, if finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

// ============================================================================
// Sync Checkpoint
// ============================================================================

/// Per-provider ingestion progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Provider this checkpoint belongs to.
    pub provider: ProviderKind,
    /// Opaque adapter cursor (`None` = beginning of history).
    #[serde(default)]
    pub cursor: Option<String>,
    /// When the cursor was last advanced.
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Outcome of the last run.
    #[serde(default)]
    pub last_run_status: Option<RunStatus>,
    /// Non-quota failures since the last success.
    #[serde(default)]
    pub consecutive_failures: u32,
    /// When the most recent counted failure happened.
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Position of an unfinished full rescan. `cursor` is left alone until
    /// the rescan reaches the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_scan_cursor: Option<String>,
}

impl SyncCheckpoint {
    /// Empty checkpoint for `provider`.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            cursor: None,
            last_synced_at: None,
            last_run_status: None,
            consecutive_failures: 0,
            last_failure_at: None,
            full_scan_cursor: None,
        }
    }

    /// Where a run in `mode` picks up (`None` = beginning of history).
    pub fn resume_point(&self, mode: SyncMode) -> Option<&str> {
        if mode.resumes() {
            self.cursor.as_deref()
        } else {
            self.full_scan_cursor.as_deref()
        }
    }

    /// Whether non-forced syncs should be skipped at `now`.
    ///
    /// Back-off holds while failures exceed `threshold` and the last failure
    /// is younger than `window`.
    pub fn in_backoff(&self, threshold: u32, window: chrono::Duration, now: DateTime<Utc>) -> bool {
        if self.consecutive_failures <= threshold {
            return false;
        }
        match self.last_failure_at {
            Some(at) => now - at < window,
            None => true,
        }
    }

    /// When the back-off lifts, if currently backing off.
    pub fn backoff_until(
        &self,
        threshold: u32,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if !self.in_backoff(threshold, window, now) {
            return None;
        }
        self.last_failure_at.map(|at| at + window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sync_mode_parse() {
        assert_eq!("full".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!(" Forced ".parse::<SyncMode>().unwrap(), SyncMode::Forced);
        assert!("sometimes".parse::<SyncMode>().is_err());
        assert!(!SyncMode::Full.resumes());
        assert!(SyncMode::Forced.resumes());
    }

    #[test]
    fn test_resume_point_per_mode() {
        let mut cp = SyncCheckpoint::new(ProviderKind::GitHub);
        cp.cursor = Some("inc".into());
        assert_eq!(cp.resume_point(SyncMode::Incremental), Some("inc"));
        assert_eq!(cp.resume_point(SyncMode::Full), None);

        cp.full_scan_cursor = Some("scan".into());
        assert_eq!(cp.resume_point(SyncMode::Full), Some("scan"));
        assert_eq!(cp.resume_point(SyncMode::Forced), Some("inc"));
    }

    #[test]
    fn test_failure_reason_serde() {
        let json = serde_json::to_string(&FailureReason::QuotaExhausted).unwrap();
        assert_eq!(json, r#"{"kind":"quota_exhausted"}"#);

        let reason = FailureReason::ProviderError("503".to_string());
        let json = serde_json::to_string(&reason).unwrap();
        let back: FailureReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reason);
    }

    #[test]
    fn test_backoff_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut cp = SyncCheckpoint::new(ProviderKind::GitHub);
        cp.consecutive_failures = 3;
        cp.last_failure_at = Some(now - chrono::Duration::minutes(10));

        let window = chrono::Duration::hours(1);
        assert!(!cp.in_backoff(3, window, now));
        assert!(cp.in_backoff(2, window, now));
        assert_eq!(
            cp.backoff_until(2, window, now),
            Some(now + chrono::Duration::minutes(50))
        );

        let later = now + chrono::Duration::hours(1);
        assert!(!cp.in_backoff(2, window, later));
    }

    #[test]
    fn test_job_transitions() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut job = SyncJob::new(ProviderKind::YouTube, SyncMode::Incremental, now);
        assert_eq!(job.state, JobState::Pending);
        assert!(!job.state.is_terminal());

        job.fail(FailureReason::QuotaExhausted, now + chrono::Duration::seconds(2));
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.duration(), Some(chrono::Duration::seconds(2)));
    }
}
