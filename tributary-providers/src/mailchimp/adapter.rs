//! Mailchimp adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use tributary_core::{ContentRecord, LeasedCredential, ProviderKind, RawRecord};
use tributary_fetch::{FetchContext, FetchError, Page, ProviderAdapter};

use super::api::{CampaignsRequest, CampaignsResponse, MailchimpApiClient};
use super::parser;
use crate::cursor::{self, latest};
use crate::descriptor::ProviderOptions;

// ============================================================================
// Cursor
// ============================================================================

/// Offset paging plus a creation-time watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailchimpCursor {
    /// Records already read in the listing in progress.
    #[serde(default)]
    pub offset: u32,
    /// Campaigns created at or before this instant were already synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Newest creation time seen in the listing in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_seen: Option<DateTime<Utc>>,
}

impl MailchimpCursor {
    /// Computes the cursor following a page.
    pub fn advance(&self, response: &CampaignsResponse) -> (Self, bool) {
        let page_newest = response
            .campaigns
            .iter()
            .filter_map(|c| {
                c.get("create_time")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .max();
        let newest_seen = latest(self.newest_seen, page_newest);

        let read = u32::try_from(response.campaigns.len()).unwrap_or(u32::MAX);
        let offset = self.offset.saturating_add(read);
        if read > 0 && u64::from(offset) < response.total_items {
            (
                Self {
                    offset,
                    since: self.since,
                    newest_seen,
                },
                true,
            )
        } else {
            (
                Self {
                    offset: 0,
                    since: latest(self.since, newest_seen),
                    newest_seen: None,
                },
                false,
            )
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter listing campaigns of one account.
#[derive(Debug, Clone)]
pub struct MailchimpAdapter {
    list_id: Option<String>,
    api: MailchimpApiClient,
}

impl MailchimpAdapter {
    /// Creates an adapter from options (optional `list_id`, `server` and
    /// `base_url`).
    pub fn from_options(options: &ProviderOptions) -> Result<Self, FetchError> {
        let mut api = MailchimpApiClient::new();
        if let Some(server) = options.get("server") {
            api = api.with_server(server);
        }
        if let Some(base) = options.get("base_url") {
            api = api.with_base_url(base);
        }
        Ok(Self {
            list_id: options.get("list_id").map(str::to_string),
            api,
        })
    }
}

#[async_trait]
impl ProviderAdapter for MailchimpAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mailchimp
    }

    #[instrument(skip(self, ctx, credential), fields(credential = %credential.id))]
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        let cursor: MailchimpCursor = cursor::decode(checkpoint)?;

        let request = CampaignsRequest {
            count: page_size,
            offset: cursor.offset,
            since: cursor.since,
            list_id: self.list_id.as_deref(),
        };
        let response = self
            .api
            .list_campaigns(&ctx.http, &credential.token, &request)
            .await?;

        let (next, has_more) = cursor.advance(&response);
        debug!(
            campaigns = response.campaigns.len(),
            total = response.total_items,
            has_more,
            "Mailchimp page fetched"
        );

        let records = response
            .campaigns
            .into_iter()
            .map(|item| RawRecord::new(ProviderKind::Mailchimp, item))
            .collect();

        Ok(Page::new(
            records,
            Some(cursor::encode(&next)?),
            has_more,
            self.units_per_page(),
        ))
    }

    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
        parser::to_canonical(raw)
    }

    fn cache_scope(&self) -> serde_json::Value {
        json!({ "list_id": self.list_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response(times: &[&str], total: u64) -> CampaignsResponse {
        CampaignsResponse {
            campaigns: times
                .iter()
                .enumerate()
                .map(|(i, t)| json!({"id": format!("c{i}"), "create_time": t}))
                .collect(),
            total_items: total,
        }
    }

    #[test]
    fn test_offset_advances_until_total() {
        let (next, has_more) = MailchimpCursor::default().advance(&response(
            &["2024-01-01T00:00:00+00:00", "2024-01-02T00:00:00+00:00"],
            5,
        ));
        assert!(has_more);
        assert_eq!(next.offset, 2);

        let (last, has_more) = next.advance(&response(
            &[
                "2024-01-03T00:00:00+00:00",
                "2024-01-04T00:00:00+00:00",
                "2024-01-05T00:00:00+00:00",
            ],
            5,
        ));
        assert!(!has_more);
        assert_eq!(last.offset, 0);
        assert_eq!(
            last.since,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_page_finishes() {
        let cursor = MailchimpCursor {
            offset: 10,
            since: None,
            newest_seen: None,
        };
        let (next, has_more) = cursor.advance(&response(&[], 50));
        assert!(!has_more);
        assert_eq!(next.offset, 0);
    }

    #[test]
    fn test_options_are_optional() {
        let adapter = MailchimpAdapter::from_options(&ProviderOptions::default()).unwrap();
        assert_eq!(adapter.kind(), ProviderKind::Mailchimp);
        assert!(adapter.cache_scope()["list_id"].is_null());
    }
}
