//! Polling scheduler.
//!
//! Every tick starts an incremental sync for each provider. Providers run
//! in parallel; a provider whose previous job is still running is skipped
//! for that tick.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use tributary_core::{ProviderKind, SyncJob, SyncMode};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::orchestrator::{StartOutcome, SyncOrchestrator};

/// What a tick did for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TickResult {
    /// A job was started.
    Started {
        /// Id of the new job.
        job_id: Uuid,
    },
    /// The previous job is still running.
    AlreadyRunning,
    /// The provider is backing off.
    BackedOff,
    /// The job could not be started.
    Error {
        /// Error message.
        message: String,
    },
}

/// Per-provider result of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickEntry {
    /// Provider.
    pub provider: ProviderKind,
    /// What happened.
    pub result: TickResult,
}

/// Totals over a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    /// Ticks executed.
    pub ticks: u64,
    /// Jobs started.
    pub started: u64,
    /// Provider slots skipped (running or backing off).
    pub skipped: u64,
    /// Start failures.
    pub errors: u64,
}

/// Periodically starts incremental syncs.
pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    providers: Vec<ProviderKind>,
    in_flight: Vec<JoinHandle<SyncResult<SyncJob>>>,
}

impl Scheduler {
    /// Creates a scheduler over every provider the orchestrator knows.
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        let interval = orchestrator.settings().interval;
        let providers = orchestrator.providers();
        Self {
            orchestrator,
            interval,
            providers,
            in_flight: Vec::new(),
        }
    }

    /// Overrides the tick interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Restricts the scheduler to some providers.
    #[must_use]
    pub fn with_providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = providers;
        self
    }

    /// Starts one round of syncs without waiting for them.
    pub async fn tick(&mut self) -> Vec<TickEntry> {
        self.in_flight.retain(|h| !h.is_finished());

        let mut entries = Vec::with_capacity(self.providers.len());
        for provider in self.providers.clone() {
            let result = match self
                .orchestrator
                .start_sync(provider, SyncMode::Incremental)
                .await
            {
                Ok(StartOutcome::Started { job_id, handle }) => {
                    self.in_flight.push(handle);
                    TickResult::Started { job_id }
                }
                Ok(StartOutcome::AlreadyRunning(job)) => {
                    debug!(provider = %provider, job_id = %job.id, "Previous sync still running");
                    TickResult::AlreadyRunning
                }
                Ok(StartOutcome::BackedOff { .. }) => TickResult::BackedOff,
                Err(err) => {
                    warn!(provider = %provider, error = %err, "Could not start sync");
                    TickResult::Error {
                        message: err.to_string(),
                    }
                }
            };
            entries.push(TickEntry { provider, result });
        }
        entries
    }

    /// Ticks until `shutdown` turns `true` or its sender is dropped, then
    /// waits for jobs still in flight. Jobs are never cancelled mid-run.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerReport {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            providers = self.providers.len(),
            "Scheduler started"
        );

        let mut report = SchedulerReport::default();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    report.ticks += 1;
                    for entry in self.tick().await {
                        match entry.result {
                            TickResult::Started { .. } => report.started += 1,
                            TickResult::AlreadyRunning | TickResult::BackedOff => report.skipped += 1,
                            TickResult::Error { .. } => report.errors += 1,
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(in_flight = self.in_flight.len(), "Scheduler stopping, waiting for running jobs");
        for joined in join_all(self.in_flight.drain(..)).await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => error!(error = %err, "Sync job aborted"),
                Err(err) => error!(error = %err, "Sync task panicked"),
            }
        }

        info!(
            ticks = report.ticks,
            started = report.started,
            skipped = report.skipped,
            errors = report.errors,
            "Scheduler stopped"
        );
        report
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("providers", &self.providers)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
