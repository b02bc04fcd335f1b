//! YouTube adapter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use tributary_core::{ContentRecord, LeasedCredential, ProviderKind, RawRecord};
use tributary_fetch::{FetchContext, FetchError, Page, ProviderAdapter};

use super::api::{SEARCH_COST_UNITS, SearchListResponse, SearchRequest, YouTubeApiClient};
use super::parser;
use crate::cursor::{self, latest};
use crate::descriptor::ProviderOptions;

// ============================================================================
// Cursor
// ============================================================================

/// Resumable position in a channel's uploads.
///
/// While `page_token` is set the adapter is walking one listing, newest
/// first. When the listing ends, the newest publish time seen becomes the
/// `published_after` watermark for the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YouTubeCursor {
    /// Native page token of the listing in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Only videos published after this instant are listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_after: Option<DateTime<Utc>>,
    /// Newest publish time seen in the listing in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_seen: Option<DateTime<Utc>>,
}

impl YouTubeCursor {
    /// Computes the cursor following a page, and whether more pages remain.
    pub fn advance(&self, response: &SearchListResponse) -> (Self, bool) {
        let page_newest = response
            .items
            .iter()
            .filter_map(|item| {
                item.pointer("/snippet/publishedAt")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .max();
        let newest_seen = latest(self.newest_seen, page_newest);

        match response.next_page_token.as_deref() {
            Some(token) if !token.is_empty() && Some(token) != self.page_token.as_deref() => (
                Self {
                    page_token: Some(token.to_string()),
                    published_after: self.published_after,
                    newest_seen,
                },
                true,
            ),
            _ => (
                Self {
                    page_token: None,
                    published_after: latest(self.published_after, newest_seen),
                    newest_seen: None,
                },
                false,
            ),
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter listing one channel's videos.
#[derive(Debug, Clone)]
pub struct YouTubeAdapter {
    channel_id: String,
    api: YouTubeApiClient,
}

impl YouTubeAdapter {
    /// Creates an adapter for a channel.
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            api: YouTubeApiClient::new(),
        }
    }

    /// Creates an adapter from configured options (`channel_id`, optional
    /// `base_url`).
    pub fn from_options(options: &ProviderOptions) -> Result<Self, FetchError> {
        let channel_id = options.require(ProviderKind::YouTube, "channel_id")?;
        let api = match options.get("base_url") {
            Some(base) => YouTubeApiClient::with_base_url(base),
            None => YouTubeApiClient::new(),
        };
        Ok(Self {
            channel_id: channel_id.to_string(),
            api,
        })
    }

    /// Returns the channel id.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

#[async_trait]
impl ProviderAdapter for YouTubeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::YouTube
    }

    #[instrument(skip(self, ctx, credential), fields(credential = %credential.id))]
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        let cursor: YouTubeCursor = cursor::decode(checkpoint)?;

        // publishedAfter is inclusive; step past the last video already seen.
        let published_after = cursor.published_after.map(|ts| ts + Duration::seconds(1));
        let request = SearchRequest {
            channel_id: &self.channel_id,
            max_results: page_size,
            page_token: cursor.page_token.as_deref(),
            published_after,
        };

        let response = self
            .api
            .search(&ctx.http, &credential.token, &request)
            .await?;

        let (next, has_more) = cursor.advance(&response);
        debug!(
            items = response.items.len(),
            has_more, "YouTube page fetched"
        );

        let records = response
            .items
            .into_iter()
            .map(|item| RawRecord::new(ProviderKind::YouTube, item))
            .collect();

        Ok(Page::new(
            records,
            Some(cursor::encode(&next)?),
            has_more,
            SEARCH_COST_UNITS,
        ))
    }

    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
        parser::to_canonical(raw)
    }

    fn units_per_page(&self) -> u64 {
        SEARCH_COST_UNITS
    }

    fn cache_scope(&self) -> serde_json::Value {
        json!({ "channel_id": self.channel_id })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response(token: Option<&str>, published: &[&str]) -> SearchListResponse {
        SearchListResponse {
            next_page_token: token.map(str::to_string),
            items: published
                .iter()
                .enumerate()
                .map(|(i, ts)| json!({"id": {"videoId": format!("v{i}")}, "snippet": {"publishedAt": ts}}))
                .collect(),
            page_info: None,
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_mid_listing_keeps_watermark() {
        let cursor = YouTubeCursor {
            published_after: Some(ts(1)),
            ..Default::default()
        };
        let (next, has_more) =
            cursor.advance(&response(Some("P2"), &["2024-01-05T00:00:00Z", "2024-01-04T00:00:00Z"]));

        assert!(has_more);
        assert_eq!(next.page_token.as_deref(), Some("P2"));
        assert_eq!(next.published_after, Some(ts(1)));
        assert_eq!(next.newest_seen, Some(ts(5)));
    }

    #[test]
    fn test_end_of_listing_moves_watermark() {
        let cursor = YouTubeCursor {
            page_token: Some("P2".into()),
            published_after: Some(ts(1)),
            newest_seen: Some(ts(5)),
        };
        let (next, has_more) = cursor.advance(&response(None, &["2024-01-03T00:00:00Z"]));

        assert!(!has_more);
        assert_eq!(next.page_token, None);
        assert_eq!(next.published_after, Some(ts(5)));
        assert_eq!(next.newest_seen, None);
    }

    #[test]
    fn test_empty_listing_keeps_watermark() {
        let cursor = YouTubeCursor {
            published_after: Some(ts(9)),
            ..Default::default()
        };
        let (next, has_more) = cursor.advance(&response(None, &[]));
        assert!(!has_more);
        assert_eq!(next.published_after, Some(ts(9)));
    }

    #[test]
    fn test_repeated_token_stops() {
        let cursor = YouTubeCursor {
            page_token: Some("same".into()),
            ..Default::default()
        };
        let (_, has_more) = cursor.advance(&response(Some("same"), &[]));
        assert!(!has_more);
    }

    #[test]
    fn test_from_options() {
        assert!(YouTubeAdapter::from_options(&ProviderOptions::default()).is_err());

        let adapter =
            YouTubeAdapter::from_options(&ProviderOptions::default().with("channel_id", "UC9"))
                .unwrap();
        assert_eq!(adapter.channel_id(), "UC9");
        assert_eq!(adapter.units_per_page(), 100);
        assert_eq!(adapter.cache_scope()["channel_id"], "UC9");
    }
}
