//! Trait definitions for Tributary.
//!
//! This module defines the ports the sync engine writes through.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::{ContentKey, ContentRecord, ProviderKind, UpsertOutcome};

/// The unified content store.
///
/// Implementors must treat `(provider, native_id)` as the natural key:
/// writing a record whose key already exists updates it in place instead of
/// creating a duplicate. Concurrent upserts of different keys must be safe;
/// concurrent upserts of the same key are serialized by the store.
///
/// Any failure other than the expected key conflict must be returned as an
/// error, never silently dropped.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Inserts or updates a record.
    async fn upsert(&self, record: &ContentRecord) -> Result<UpsertOutcome, CoreError>;

    /// Reads a record by key.
    async fn get(&self, key: &ContentKey) -> Result<Option<ContentRecord>, CoreError>;

    /// Counts stored records, optionally for a single provider.
    async fn count(&self, provider: Option<ProviderKind>) -> Result<u64, CoreError>;
}
