//! Airtable adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use tributary_core::{ContentRecord, LeasedCredential, ProviderKind, RawRecord};
use tributary_fetch::{FetchContext, FetchError, Page, ProviderAdapter};

use super::api::{AirtableApiClient, ListRequest};
use super::parser;
use crate::cursor;
use crate::descriptor::ProviderOptions;

// ============================================================================
// Cursor
// ============================================================================

/// Native offset plus a modification watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirtableCursor {
    /// Native offset of the listing in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    /// Records modified at or before this instant were already synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// When the listing in progress started; becomes `since` when it ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_started: Option<DateTime<Utc>>,
}

impl AirtableCursor {
    /// Computes the cursor following a page.
    ///
    /// `now` is only used when this page starts a new listing.
    pub fn advance(&self, next_offset: Option<String>, now: DateTime<Utc>) -> (Self, bool) {
        let run_started = self.run_started.or(Some(now));
        match next_offset.filter(|o| !o.is_empty()) {
            Some(offset) => (
                Self {
                    offset: Some(offset),
                    since: self.since,
                    run_started,
                },
                true,
            ),
            None => (
                Self {
                    offset: None,
                    since: run_started,
                    run_started: None,
                },
                false,
            ),
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter reading one Airtable table.
#[derive(Debug, Clone)]
pub struct AirtableAdapter {
    base_id: String,
    table: String,
    view: Option<String>,
    title_field: Option<String>,
    api: AirtableApiClient,
}

impl AirtableAdapter {
    /// Creates an adapter from options (`base_id`, `table`, optional `view`,
    /// `title_field` and `base_url`).
    pub fn from_options(options: &ProviderOptions) -> Result<Self, FetchError> {
        let base_id = options.require(ProviderKind::Airtable, "base_id")?;
        let table = options.require(ProviderKind::Airtable, "table")?;
        let api = match options.get("base_url") {
            Some(base) => AirtableApiClient::with_base_url(base),
            None => AirtableApiClient::new(),
        };
        Ok(Self {
            base_id: base_id.to_string(),
            table: table.to_string(),
            view: options.get("view").map(str::to_string),
            title_field: options.get("title_field").map(str::to_string),
            api,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AirtableAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Airtable
    }

    #[instrument(skip(self, ctx, credential), fields(table = %self.table))]
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        let cursor: AirtableCursor = cursor::decode(checkpoint)?;

        let request = ListRequest {
            page_size,
            offset: cursor.offset.as_deref(),
            view: self.view.as_deref(),
            modified_after: cursor.since,
        };
        let response = self
            .api
            .list_records(
                &ctx.http,
                &credential.token,
                &self.base_id,
                &self.table,
                &request,
            )
            .await?;

        let (next, has_more) = cursor.advance(response.offset, Utc::now());
        debug!(
            records = response.records.len(),
            has_more, "Airtable page fetched"
        );

        let records = response
            .records
            .into_iter()
            .map(|item| RawRecord::new(ProviderKind::Airtable, item))
            .collect();

        Ok(Page::new(
            records,
            Some(cursor::encode(&next)?),
            has_more,
            self.units_per_page(),
        ))
    }

    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
        parser::to_canonical_with(raw, self.title_field.as_deref())
    }

    fn cache_scope(&self) -> serde_json::Value {
        json!({ "base_id": self.base_id, "table": self.table, "view": self.view })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_listing_in_progress() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let (next, has_more) = AirtableCursor::default().advance(Some("itr/rec9".into()), now);

        assert!(has_more);
        assert_eq!(next.offset.as_deref(), Some("itr/rec9"));
        assert_eq!(next.run_started, Some(now));
        assert_eq!(next.since, None);
    }

    #[test]
    fn test_listing_end_moves_watermark_to_run_start() {
        let started = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 5, 0).unwrap();
        let cursor = AirtableCursor {
            offset: Some("itr/rec9".into()),
            since: None,
            run_started: Some(started),
        };

        let (next, has_more) = cursor.advance(None, later);
        assert!(!has_more);
        assert_eq!(next.since, Some(started));
        assert_eq!(next.offset, None);
        assert_eq!(next.run_started, None);
    }

    #[test]
    fn test_requires_base_and_table() {
        let options = ProviderOptions::default().with("base_id", "appX");
        assert!(AirtableAdapter::from_options(&options).is_err());

        let adapter = AirtableAdapter::from_options(&options.with("table", "Tasks")).unwrap();
        assert_eq!(adapter.cache_scope()["table"], "Tasks");
    }
}
