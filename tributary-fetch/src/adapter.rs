//! Provider adapter contract.
//!
//! An adapter is the capability pair "page fetcher + canonical mapper" for
//! one provider. The orchestrator only ever talks to `dyn ProviderAdapter`;
//! concrete adapters are selected by configuration through the provider
//! registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tributary_core::{ContentRecord, LeasedCredential, ProviderKind, RawRecord};

use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Page
// ============================================================================

/// One page of raw records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Raw records in provider order.
    pub records: Vec<RawRecord>,
    /// Cursor to resume from. Passing it back to `fetch_page` continues
    /// where this page ended.
    pub next_checkpoint: Option<String>,
    /// Whether another page is available right now.
    pub has_more: bool,
    /// Quota units the request cost.
    #[serde(default)]
    pub units_consumed: u64,
    /// Whether the page was served from the cache (no quota spent).
    #[serde(skip)]
    pub from_cache: bool,
}

impl Page {
    /// Creates a page fetched from the network.
    pub fn new(
        records: Vec<RawRecord>,
        next_checkpoint: Option<String>,
        has_more: bool,
        units_consumed: u64,
    ) -> Self {
        Self {
            records,
            next_checkpoint,
            has_more,
            units_consumed,
            from_cache: false,
        }
    }

    /// A final page with no records that keeps the cursor unchanged.
    pub fn empty(checkpoint: Option<String>, units_consumed: u64) -> Self {
        Self::new(Vec::new(), checkpoint, false, units_consumed)
    }

    /// Number of records on the page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Provider Adapter Trait
// ============================================================================

/// Pages through one provider and maps its records to canonical form.
///
/// ## Implementing an Adapter
///
/// ```ignore
/// struct ExampleAdapter { options: ExampleOptions }
///
/// #[async_trait]
/// impl ProviderAdapter for ExampleAdapter {
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::GitHub
///     }
///
///     async fn fetch_page(
///         &self,
///         ctx: &FetchContext,
///         credential: &LeasedCredential,
///         checkpoint: Option<&str>,
///         page_size: u32,
///     ) -> Result<Page, FetchError> {
///         let cursor = ExampleCursor::decode(checkpoint)?;
///         // call the API, build the next cursor
///     }
///
///     fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
///         parser::to_canonical(raw)
///     }
/// }
/// ```
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter serves.
    fn kind(&self) -> ProviderKind;

    /// Cursor representing the start of the provider's history.
    ///
    /// `None` means "no cursor"; adapters decode it as their initial state.
    fn beginning_of_history(&self) -> Option<String> {
        None
    }

    /// Fetches the page following `checkpoint`.
    ///
    /// Must be resumable: calling again with the returned
    /// `next_checkpoint` continues where the page ended. Adapters without
    /// native cursors simulate one (offset, page number, or timestamp
    /// watermark) and encode it in the cursor string.
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> Result<Page, FetchError>;

    /// Maps a raw record to canonical form.
    ///
    /// Pure and infallible: missing fields map to defaults. Returns `None`
    /// only when the record cannot be identified at all; the caller counts
    /// it as skipped.
    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord>;

    /// Quota units one page request costs.
    fn units_per_page(&self) -> u64 {
        1
    }

    /// Options that change what a page contains (channel id, table name).
    ///
    /// Folded into the page cache key so differently configured adapters
    /// never share cache entries.
    fn cache_scope(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

// ============================================================================
// Adapter Info
// ============================================================================

/// Information about an adapter (for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Provider served.
    pub provider: ProviderKind,
    /// Quota units per page request.
    pub units_per_page: u64,
    /// Cache scope.
    pub scope: serde_json::Value,
}

impl AdapterInfo {
    /// Creates adapter info from an adapter implementation.
    pub fn from_adapter(adapter: &dyn ProviderAdapter) -> Self {
        Self {
            provider: adapter.kind(),
            units_per_page: adapter.units_per_page(),
            scope: adapter.cache_scope(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_cache_roundtrip_clears_from_cache() {
        let mut page = Page::new(
            vec![RawRecord::new(ProviderKind::YouTube, json!({"id": "a"}))],
            Some("cursor".into()),
            true,
            100,
        );
        page.from_cache = true;

        let json = serde_json::to_string(&page).unwrap();
        let back: Page = serde_json::from_str(&json).unwrap();
        assert!(!back.from_cache);
        assert_eq!(back.len(), 1);
        assert_eq!(back.units_consumed, 100);
    }

    #[test]
    fn test_empty_page_keeps_cursor() {
        let page = Page::empty(Some("c".into()), 1);
        assert!(page.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.next_checkpoint.as_deref(), Some("c"));
    }
}
