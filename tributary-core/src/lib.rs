// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Tributary Core
//!
//! Core types, models, and ports for the Tributary ingestion engine.
//!
//! This crate provides the foundational abstractions shared by every other
//! Tributary crate:
//!
//! - Domain models (providers, content records, credentials, sync jobs)
//! - The core error type
//! - The [`ContentStore`] port the orchestrator writes through
//! - A [`Clock`] abstraction so day rollover can be tested
//!
//! ## Key Types
//!
//! ### Provider & Content
//! - [`ProviderKind`] - Enum of all supported content providers
//! - [`RawRecord`] - A provider payload before canonical mapping
//! - [`ContentRecord`] - The unified, provider-independent content item
//! - [`ContentKey`] - The `(provider, native id)` natural key
//!
//! ### Quota
//! - [`CredentialState`] - Daily usage counter for one credential
//! - [`QuotaLedger`] - All credential states for one provider
//! - [`LeasedCredential`] - A credential handed out by the rotator
//! - [`CredentialUsage`] - Per-credential status row
//!
//! ### Sync
//! - [`SyncMode`], [`JobState`], [`RunStatus`], [`FailureReason`]
//! - [`SyncJob`] - One run of the orchestrator for one provider
//! - [`SyncCheckpoint`] - Per-provider progress marker

pub mod clock;
pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Provider & content types
    ContentKey,
    ContentKind,
    ContentRecord,
    ProviderKind,
    RawRecord,
    UNTITLED,
    UpsertOutcome,
    // Quota types
    CredentialState,
    CredentialUsage,
    LeasedCredential,
    QuotaLedger,
    // Sync types
    FailureReason,
    JobCounts,
    JobState,
    RunStatus,
    SyncCheckpoint,
    SyncJob,
    SyncMode,
};

// Re-export ports
pub use clock::{Clock, FixedClock, SystemClock};
pub use traits::ContentStore;
