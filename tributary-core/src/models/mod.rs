//! Domain models for Tributary.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider kinds
//! - [`content`] - Raw and canonical content records
//! - [`quota`] - Credential usage and ledgers
//! - [`sync`] - Sync modes, jobs, and checkpoints

mod content;
mod provider;
mod quota;
mod sync;

// Re-export everything at the models level
pub use content::{ContentKey, ContentKind, ContentRecord, RawRecord, UNTITLED, UpsertOutcome};
pub use provider::ProviderKind;
pub use quota::{CredentialState, CredentialUsage, LeasedCredential, QuotaLedger};
pub use sync::{
    FailureReason, JobCounts, JobState, RunStatus, SyncCheckpoint, SyncJob, SyncMode,
};
