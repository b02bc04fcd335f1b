//! Sync orchestrator.
//!
//! Runs sync jobs per provider: picks the starting cursor, leases a
//! credential, pages through the adapter via the cache, upserts canonical
//! records and persists the checkpoint after every page.
//!
//! At most one job runs per provider. A second start request for a busy
//! provider is answered with the running job instead of being queued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use tributary_core::{
    Clock, ContentStore, CredentialUsage, FailureReason, JobState, LeasedCredential, ProviderKind,
    RunStatus, SyncCheckpoint, SyncJob, SyncMode, SystemClock, UpsertOutcome,
};
use tributary_fetch::{CacheStats, FetchContext, FetchError, Page, PageFetcher, ProviderAdapter};
use tributary_store::{CheckpointStorage, CredentialRotator, JobHistory, StoreError};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::settings::SyncSettings;

// ============================================================================
// Outcomes
// ============================================================================

/// Result of [`SyncOrchestrator::start_sync`].
#[derive(Debug)]
pub enum StartOutcome {
    /// A new job was spawned.
    Started {
        /// Id of the new job.
        job_id: Uuid,
        /// Resolves to the finished job.
        handle: JoinHandle<SyncResult<SyncJob>>,
    },
    /// A job is already running for the provider; nothing was started.
    AlreadyRunning(SyncJob),
    /// The provider is backing off after repeated failures.
    BackedOff {
        /// When non-forced syncs are allowed again.
        until: Option<DateTime<Utc>>,
        /// Failures that triggered the back-off.
        consecutive_failures: u32,
    },
}

/// Result of [`SyncOrchestrator::run_sync`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The job ran to an end state (succeeded or failed).
    Completed(SyncJob),
    /// A job is already running for the provider.
    AlreadyRunning(SyncJob),
    /// The provider is backing off after repeated failures.
    BackedOff {
        /// When non-forced syncs are allowed again.
        until: Option<DateTime<Utc>>,
        /// Failures that triggered the back-off.
        consecutive_failures: u32,
    },
}

impl SyncOutcome {
    /// The job this outcome refers to, if any.
    pub fn job(&self) -> Option<&SyncJob> {
        match self {
            Self::Completed(job) | Self::AlreadyRunning(job) => Some(job),
            Self::BackedOff { .. } => None,
        }
    }

    /// Whether the run stopped because no credential had quota left.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Completed(SyncJob { reason: Some(reason), .. }) if reason.is_quota()
        )
    }
}

/// Whether a provider has a job in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// No job running.
    Idle,
    /// A job is running.
    Running,
}

/// Snapshot returned by [`SyncOrchestrator::get_sync_status`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Provider described.
    pub provider: ProviderKind,
    /// Idle or running.
    pub state: ProviderState,
    /// The running job, with live counts.
    pub active_job: Option<SyncJob>,
    /// The most recently finished job.
    pub last_job: Option<SyncJob>,
    /// Persisted checkpoint.
    pub checkpoint: Option<SyncCheckpoint>,
    /// Non-quota failures since the last success.
    pub consecutive_failures: u32,
    /// When back-off lifts, if backing off now.
    pub backoff_until: Option<DateTime<Utc>>,
}

// ============================================================================
// Running Jobs
// ============================================================================

type RunningJobs = Arc<Mutex<HashMap<ProviderKind, SyncJob>>>;

/// Claim on a provider's single job slot; released on drop.
struct RunSlot {
    provider: ProviderKind,
    running: RunningJobs,
}

impl RunSlot {
    /// Claims the slot, or returns the job already holding it.
    fn claim(running: &RunningJobs, job: &SyncJob) -> Result<Self, SyncJob> {
        let mut jobs = running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = jobs.get(&job.provider) {
            return Err(active.clone());
        }
        jobs.insert(job.provider, job.clone());
        Ok(Self {
            provider: job.provider,
            running: Arc::clone(running),
        })
    }

    /// Publishes live progress.
    fn update(&self, job: &SyncJob) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.provider, job.clone());
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.provider);
    }
}

enum Begin {
    Ready(PreparedRun),
    AlreadyRunning(SyncJob),
    BackedOff {
        until: Option<DateTime<Utc>>,
        consecutive_failures: u32,
    },
}

struct PreparedRun {
    slot: RunSlot,
    job: SyncJob,
    checkpoint: SyncCheckpoint,
    adapter: Arc<dyn ProviderAdapter>,
}

enum RunEnd {
    /// The provider reported no more pages.
    Complete,
    /// `max_pages_per_run` reached; the next run resumes.
    PageLimit,
    /// No credential left with quota.
    QuotaExhausted,
    /// Page fetch failed after retries.
    Failed(String),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Schedules and runs sync jobs.
pub struct SyncOrchestrator {
    ctx: Arc<FetchContext>,
    fetcher: PageFetcher,
    rotator: Arc<CredentialRotator>,
    checkpoints: Arc<dyn CheckpointStorage>,
    store: Arc<dyn ContentStore>,
    history: Arc<JobHistory>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    running: RunningJobs,
}

impl SyncOrchestrator {
    /// Creates a builder.
    pub fn builder() -> SyncOrchestratorBuilder {
        SyncOrchestratorBuilder::default()
    }

    /// Providers with a registered adapter, sorted.
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// The settings in use.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn adapter(&self, provider: ProviderKind) -> SyncResult<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or(SyncError::NotConfigured(provider))
    }

    fn active_job(&self, provider: ProviderKind) -> Option<SyncJob> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned()
    }

    // ========================================================================
    // Starting Jobs
    // ========================================================================

    /// Starts a job in the background.
    ///
    /// Returns the running job instead when one is already in progress,
    /// and refuses non-forced starts while the provider backs off.
    pub async fn start_sync(
        self: &Arc<Self>,
        provider: ProviderKind,
        mode: SyncMode,
    ) -> SyncResult<StartOutcome> {
        match self.begin(provider, mode).await? {
            Begin::Ready(run) => {
                let job_id = run.job.id;
                let this = Arc::clone(self);
                let handle = tokio::spawn(async move { this.execute(run).await });
                Ok(StartOutcome::Started { job_id, handle })
            }
            Begin::AlreadyRunning(job) => Ok(StartOutcome::AlreadyRunning(job)),
            Begin::BackedOff {
                until,
                consecutive_failures,
            } => Ok(StartOutcome::BackedOff {
                until,
                consecutive_failures,
            }),
        }
    }

    /// Runs a job to completion on the current task.
    ///
    /// Quota exhaustion and provider failures are reported on the returned
    /// job. An `Err` means checkpoint or ledger state could not be
    /// persisted; the job is still recorded as failed.
    pub async fn run_sync(&self, provider: ProviderKind, mode: SyncMode) -> SyncResult<SyncOutcome> {
        match self.begin(provider, mode).await? {
            Begin::Ready(run) => self.execute(run).await.map(SyncOutcome::Completed),
            Begin::AlreadyRunning(job) => Ok(SyncOutcome::AlreadyRunning(job)),
            Begin::BackedOff {
                until,
                consecutive_failures,
            } => Ok(SyncOutcome::BackedOff {
                until,
                consecutive_failures,
            }),
        }
    }

    /// Runs every registered provider concurrently, one job each.
    pub async fn sync_all(&self, mode: SyncMode) -> Vec<(ProviderKind, SyncResult<SyncOutcome>)> {
        let providers = self.providers();
        let runs = providers.iter().map(|p| self.run_sync(*p, mode));
        providers.iter().copied().zip(join_all(runs).await).collect()
    }

    async fn begin(&self, provider: ProviderKind, mode: SyncMode) -> SyncResult<Begin> {
        let adapter = self.adapter(provider)?;
        if !self.rotator.providers().contains(&provider) {
            return Err(SyncError::NotConfigured(provider));
        }

        let now = self.clock.now();
        let job = SyncJob::new(provider, mode, now);
        let slot = match RunSlot::claim(&self.running, &job) {
            Ok(slot) => slot,
            Err(active) => {
                info!(
                    provider = %provider,
                    running_job = %active.id,
                    requested = %mode,
                    "Sync already in progress"
                );
                return Ok(Begin::AlreadyRunning(active));
            }
        };

        let checkpoint = self
            .checkpoints
            .load(provider)
            .await
            .map_err(|e| SyncError::persistence(provider, e))?
            .unwrap_or_else(|| SyncCheckpoint::new(provider));

        if mode != SyncMode::Forced
            && checkpoint.in_backoff(
                self.settings.failure_threshold,
                self.settings.backoff_window,
                now,
            )
        {
            let until = checkpoint.backoff_until(
                self.settings.failure_threshold,
                self.settings.backoff_window,
                now,
            );
            warn!(
                provider = %provider,
                failures = checkpoint.consecutive_failures,
                until = ?until,
                "Provider backing off, sync skipped"
            );
            return Ok(Begin::BackedOff {
                until,
                consecutive_failures: checkpoint.consecutive_failures,
            });
        }

        Ok(Begin::Ready(PreparedRun {
            slot,
            job,
            checkpoint,
            adapter,
        }))
    }

    // ========================================================================
    // Running Jobs
    // ========================================================================

    #[instrument(
        skip(self, run),
        fields(provider = %run.job.provider, mode = %run.job.mode, job_id = %run.job.id)
    )]
    async fn execute(&self, run: PreparedRun) -> SyncResult<SyncJob> {
        let PreparedRun {
            slot,
            mut job,
            mut checkpoint,
            adapter,
        } = run;

        let result = self
            .drive(&slot, &mut job, &mut checkpoint, adapter.as_ref())
            .await;

        if let Err(err) = &result {
            error!(error = %err, "Sync aborted");
            job.fail(
                FailureReason::PersistenceError(err.to_string()),
                self.clock.now(),
            );
        }

        if let Err(err) = self.history.record(job.clone()).await {
            warn!(error = %err, "Failed to record job history");
        }
        drop(slot);

        result.map(|()| job)
    }

    async fn drive(
        &self,
        slot: &RunSlot,
        job: &mut SyncJob,
        checkpoint: &mut SyncCheckpoint,
        adapter: &dyn ProviderAdapter,
    ) -> SyncResult<()> {
        let provider = job.provider;
        let persist = |e: StoreError| SyncError::persistence(provider, e);
        let page_size = self.settings.page_size_for(provider);

        let mut cursor = checkpoint
            .resume_point(job.mode)
            .map(String::from)
            .or_else(|| adapter.beginning_of_history());
        job.checkpoint_before.clone_from(&cursor);
        job.state = JobState::Running;
        slot.update(job);
        info!(cursor = ?cursor, page_size, "Sync started");

        let Some(mut lease) = self.rotator.acquire(provider).await.map_err(persist)? else {
            warn!("No credential with quota left, sync not started");
            return self.finish(job, checkpoint, cursor, RunEnd::QuotaExhausted).await;
        };
        job.credentials_used.push(lease.id.clone());

        let end = loop {
            if job.pages >= self.settings.max_pages_per_run {
                info!(pages = job.pages, "Page limit reached, next run resumes");
                break RunEnd::PageLimit;
            }

            let outcome = self
                .fetcher
                .fetch(adapter, &self.ctx, &lease, cursor.as_deref(), page_size)
                .await;

            let page = match outcome.result {
                Ok(page) => page,
                Err(FetchError::QuotaExceeded(detail)) => {
                    warn!(credential = %lease.id, detail = %detail, "Provider reports quota spent");
                    self.rotator
                        .block(provider, &lease.id)
                        .await
                        .map_err(persist)?;
                    match self.rotate(provider, job).await? {
                        Some(next) => {
                            lease = next;
                            continue;
                        }
                        None => break RunEnd::QuotaExhausted,
                    }
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        attempts = outcome.attempts.len(),
                        "Page fetch failed"
                    );
                    break RunEnd::Failed(err.to_string());
                }
            };

            self.ingest(adapter, job, &page).await;

            let mut blocked = false;
            if page.units_consumed > 0 {
                job.units_consumed = job.units_consumed.saturating_add(page.units_consumed);
                let usage = self
                    .rotator
                    .record(provider, &lease.id, page.units_consumed)
                    .await
                    .map_err(persist)?;
                blocked = usage.blocked;
            }

            if page.next_checkpoint.is_some() {
                cursor.clone_from(&page.next_checkpoint);
            }
            if job.mode.resumes() {
                checkpoint.cursor.clone_from(&cursor);
                checkpoint.last_synced_at = Some(self.clock.now());
            } else {
                checkpoint.full_scan_cursor.clone_from(&cursor);
            }
            self.checkpoints.save(checkpoint).await.map_err(persist)?;
            job.checkpoint_after.clone_from(&cursor);
            slot.update(job);

            if !page.has_more {
                break RunEnd::Complete;
            }
            if blocked {
                match self.rotate(provider, job).await? {
                    Some(next) => lease = next,
                    None => break RunEnd::QuotaExhausted,
                }
            }
        };

        self.finish(job, checkpoint, cursor, end).await
    }

    /// Maps and upserts one page. Per-record failures are counted, never
    /// propagated.
    async fn ingest(&self, adapter: &dyn ProviderAdapter, job: &mut SyncJob, page: &Page) {
        job.pages += 1;
        if page.from_cache {
            job.cached_pages += 1;
        }
        job.counts.fetched += page.len() as u64;

        for raw in &page.records {
            let Some(record) = adapter.to_canonical(raw) else {
                job.counts.skipped += 1;
                debug!("Record without native id skipped");
                continue;
            };

            let write = tokio::time::timeout(self.settings.store_timeout, self.store.upsert(&record));
            match write.await {
                Ok(Ok(outcome)) => {
                    job.counts.upserted += 1;
                    if outcome == UpsertOutcome::Inserted {
                        job.counts.inserted += 1;
                    }
                }
                Ok(Err(err)) => {
                    job.counts.errored += 1;
                    warn!(key = %record.key(), error = %err, "Store write failed");
                }
                Err(_) => {
                    job.counts.errored += 1;
                    warn!(key = %record.key(), "Store write timed out");
                }
            }
        }

        debug!(
            page = job.pages,
            records = page.len(),
            cached = page.from_cache,
            upserted = job.counts.upserted,
            skipped = job.counts.skipped,
            errored = job.counts.errored,
            "Page ingested"
        );
    }

    async fn rotate(
        &self,
        provider: ProviderKind,
        job: &mut SyncJob,
    ) -> SyncResult<Option<LeasedCredential>> {
        let next = self
            .rotator
            .acquire(provider)
            .await
            .map_err(|e| SyncError::persistence(provider, e))?;

        match &next {
            Some(lease) => {
                info!(credential = %lease.id, "Rotated to a fresh credential");
                if !job.credentials_used.contains(&lease.id) {
                    job.credentials_used.push(lease.id.clone());
                }
            }
            None => warn!("No credential left, stopping with progress saved"),
        }
        Ok(next)
    }

    async fn finish(
        &self,
        job: &mut SyncJob,
        checkpoint: &mut SyncCheckpoint,
        cursor: Option<String>,
        end: RunEnd,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        let progressed = job.pages > 0;
        let fallback_status = if progressed {
            RunStatus::Partial
        } else {
            RunStatus::Failure
        };

        let reached_end = matches!(end, RunEnd::Complete);

        match end {
            RunEnd::Complete | RunEnd::PageLimit => {
                let partial = !reached_end || job.counts.errored > 0;
                // A full rescan only moves the cursor once it reaches the end.
                if reached_end && !job.mode.resumes() {
                    checkpoint.cursor = cursor;
                    checkpoint.full_scan_cursor = None;
                    checkpoint.last_synced_at = Some(now);
                }
                checkpoint.last_run_status = Some(if partial {
                    RunStatus::Partial
                } else {
                    RunStatus::Success
                });
                checkpoint.consecutive_failures = 0;
                checkpoint.last_failure_at = None;
                job.succeed(now);
            }
            RunEnd::QuotaExhausted => {
                checkpoint.last_run_status = Some(fallback_status);
                job.fail(FailureReason::QuotaExhausted, now);
            }
            RunEnd::Failed(reason) => {
                checkpoint.last_run_status = Some(fallback_status);
                checkpoint.consecutive_failures = checkpoint.consecutive_failures.saturating_add(1);
                checkpoint.last_failure_at = Some(now);
                job.fail(FailureReason::ProviderError(reason), now);
            }
        }

        self.checkpoints
            .save(checkpoint)
            .await
            .map_err(|e| SyncError::persistence(job.provider, e))?;
        job.checkpoint_after = if job.mode.resumes() || reached_end {
            checkpoint.cursor.clone()
        } else {
            checkpoint.full_scan_cursor.clone()
        };

        info!(
            state = %job.state,
            pages = job.pages,
            fetched = job.counts.fetched,
            upserted = job.counts.upserted,
            skipped = job.counts.skipped,
            errored = job.counts.errored,
            units = job.units_consumed,
            failures = checkpoint.consecutive_failures,
            "Sync finished"
        );
        Ok(())
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// State, checkpoint and failure count for a provider.
    pub async fn get_sync_status(&self, provider: ProviderKind) -> SyncResult<SyncStatus> {
        self.adapter(provider)?;
        let checkpoint = self
            .checkpoints
            .load(provider)
            .await
            .map_err(|e| SyncError::persistence(provider, e))?;
        let active_job = self.active_job(provider);
        let last_job = self.history.latest(provider).await;
        let now = self.clock.now();

        let (consecutive_failures, backoff_until) =
            checkpoint.as_ref().map_or((0, None), |cp| {
                (
                    cp.consecutive_failures,
                    cp.backoff_until(
                        self.settings.failure_threshold,
                        self.settings.backoff_window,
                        now,
                    ),
                )
            });

        Ok(SyncStatus {
            provider,
            state: if active_job.is_some() {
                ProviderState::Running
            } else {
                ProviderState::Idle
            },
            active_job,
            last_job,
            checkpoint,
            consecutive_failures,
            backoff_until,
        })
    }

    /// Per-credential usage for a provider.
    pub async fn get_quota_status(&self, provider: ProviderKind) -> SyncResult<Vec<CredentialUsage>> {
        self.rotator
            .status(provider)
            .await
            .map_err(|e| quota_error(provider, e))
    }

    /// Clears a provider's usage for today.
    pub async fn reset_quota(&self, provider: ProviderKind) -> SyncResult<Vec<CredentialUsage>> {
        self.rotator
            .reset(provider)
            .await
            .map_err(|e| quota_error(provider, e))
    }

    /// Cache counters.
    pub fn get_cache_stats(&self) -> CacheStats {
        self.ctx.cache.stats()
    }

    /// Removes cache entries matching a glob pattern.
    pub async fn clear_cache(&self, pattern: &str) -> u64 {
        self.ctx.cache.clear(pattern).await
    }

    /// Recent finished jobs for a provider, newest first.
    pub async fn recent_jobs(&self, provider: ProviderKind, limit: usize) -> Vec<SyncJob> {
        self.history.recent(provider, limit).await
    }
}

fn quota_error(provider: ProviderKind, err: StoreError) -> SyncError {
    match err {
        StoreError::ProviderNotConfigured(kind) => SyncError::NotConfigured(kind),
        other => SyncError::persistence(provider, other),
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("providers", &self.providers())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncOrchestrator`].
#[derive(Default)]
pub struct SyncOrchestratorBuilder {
    ctx: Option<Arc<FetchContext>>,
    rotator: Option<Arc<CredentialRotator>>,
    checkpoints: Option<Arc<dyn CheckpointStorage>>,
    store: Option<Arc<dyn ContentStore>>,
    history: Option<Arc<JobHistory>>,
    clock: Option<Arc<dyn Clock>>,
    settings: SyncSettings,
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl SyncOrchestratorBuilder {
    /// Sets the fetch context (HTTP client, cache).
    pub fn context(mut self, ctx: Arc<FetchContext>) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Sets the credential rotator.
    pub fn rotator(mut self, rotator: Arc<CredentialRotator>) -> Self {
        self.rotator = Some(rotator);
        self
    }

    /// Sets the checkpoint storage.
    pub fn checkpoints(mut self, checkpoints: Arc<dyn CheckpointStorage>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Sets the content store.
    pub fn store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the job history.
    pub fn history(mut self, history: Arc<JobHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the settings.
    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Registers an adapter, replacing any earlier one for the same provider.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> SyncResult<SyncOrchestrator> {
        let rotator = self
            .rotator
            .ok_or_else(|| SyncError::InvalidConfig("credential rotator is required".into()))?;
        let checkpoints = self
            .checkpoints
            .ok_or_else(|| SyncError::InvalidConfig("checkpoint storage is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("content store is required".into()))?;
        let ctx = self.ctx.unwrap_or_else(|| Arc::new(FetchContext::new()));
        let fetcher = PageFetcher::new(Arc::clone(&ctx.cache), self.settings.retry.clone())
            .with_ttl(ctx.settings.page_ttl);

        Ok(SyncOrchestrator {
            ctx,
            fetcher,
            rotator,
            checkpoints,
            store,
            history: self
                .history
                .unwrap_or_else(|| Arc::new(JobHistory::in_memory())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            settings: self.settings,
            adapters: self.adapters,
            running: RunningJobs::default(),
        })
    }
}
