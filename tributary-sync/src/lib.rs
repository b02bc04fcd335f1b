// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Tributary Sync
//!
//! Orchestration of sync jobs for the Tributary engine.
//!
//! - **SyncOrchestrator**: runs full, incremental and forced jobs, one per
//!   provider at a time, with credential rotation and per-page checkpoints
//! - **Scheduler**: polling loop that starts incremental syncs on an interval
//! - **SyncSettings**: page sizes, retry policy and back-off
//!
//! ## Job lifecycle
//!
//! ```text
//! start_sync ──► Pending ──► Running ──► Succeeded
//!      │                        │
//!      │                        └──────► Failed (quota_exhausted | provider_error | persistence_error)
//!      ├──► AlreadyRunning (another job holds the provider)
//!      └──► BackedOff (too many failures, non-forced)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tributary_core::{ProviderKind, SyncMode};
//! use tributary_sync::{SyncOrchestrator, SyncOutcome};
//!
//! let orchestrator = SyncOrchestrator::builder()
//!     .context(ctx)
//!     .rotator(rotator)
//!     .checkpoints(checkpoints)
//!     .store(store)
//!     .adapter(adapter)
//!     .build()?;
//!
//! match orchestrator.run_sync(ProviderKind::GitHub, SyncMode::Incremental).await? {
//!     SyncOutcome::Completed(job) => println!("{} upserted", job.counts.upserted),
//!     other => println!("{other:?}"),
//! }
//! ```

pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod settings;

pub use error::{SyncError, SyncResult};
pub use orchestrator::{
    ProviderState, StartOutcome, SyncOrchestrator, SyncOrchestratorBuilder, SyncOutcome,
    SyncStatus,
};
pub use scheduler::{Scheduler, SchedulerReport, TickEntry, TickResult};
pub use settings::SyncSettings;
