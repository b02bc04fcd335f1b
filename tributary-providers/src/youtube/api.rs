//! YouTube Data API client.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};
use tributary_fetch::{Auth, FetchError, HttpClient};

use super::error::classify;
use crate::cursor::rfc3339;

// ============================================================================
// Constants
// ============================================================================

/// YouTube Data API base URL.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Search endpoint.
const SEARCH_ENDPOINT: &str = "/search";

/// Quota cost of one `search.list` call.
pub const SEARCH_COST_UNITS: u64 = 100;

/// Largest `maxResults` the API accepts.
pub const MAX_RESULTS: u32 = 50;

// ============================================================================
// API Response Types
// ============================================================================

/// Response from `search.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    /// Token for the next page, absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,

    /// Search results, kept raw.
    #[serde(default)]
    pub items: Vec<serde_json::Value>,

    /// Paging summary.
    #[serde(default)]
    pub page_info: Option<PageInfo>,
}

/// Paging summary of a list response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Approximate total result count.
    #[serde(default)]
    pub total_results: Option<u64>,
    /// Results on this page.
    #[serde(default)]
    pub results_per_page: Option<u32>,
}

// ============================================================================
// Request
// ============================================================================

/// Parameters for one `search.list` call.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    /// Channel to list.
    pub channel_id: &'a str,
    /// Results per page.
    pub max_results: u32,
    /// Native page token.
    pub page_token: Option<&'a str>,
    /// Only videos published at or after this instant.
    pub published_after: Option<DateTime<Utc>>,
}

impl SearchRequest<'_> {
    /// Query parameters (without the API key).
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("part".to_string(), "snippet".to_string()),
            ("channelId".to_string(), self.channel_id.to_string()),
            ("type".to_string(), "video".to_string()),
            ("order".to_string(), "date".to_string()),
            (
                "maxResults".to_string(),
                self.max_results.clamp(1, MAX_RESULTS).to_string(),
            ),
        ];
        if let Some(token) = self.page_token {
            query.push(("pageToken".to_string(), token.to_string()));
        }
        if let Some(after) = self.published_after {
            query.push(("publishedAfter".to_string(), rfc3339(after)));
        }
        query
    }
}

// ============================================================================
// API Client
// ============================================================================

/// YouTube API client over the shared HTTP client.
#[derive(Debug, Clone)]
pub struct YouTubeApiClient {
    base_url: String,
}

impl YouTubeApiClient {
    /// Creates a client for the public API.
    pub fn new() -> Self {
        Self::with_base_url(YOUTUBE_API_BASE)
    }

    /// Creates a client for a custom base URL (proxies, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Runs one `search.list` call.
    #[instrument(skip(self, http, api_key), fields(channel = %request.channel_id))]
    pub async fn search(
        &self,
        http: &HttpClient,
        api_key: &str,
        request: &SearchRequest<'_>,
    ) -> Result<SearchListResponse, FetchError> {
        debug!(page_token = ?request.page_token, "Fetching YouTube search page");

        let url = format!("{}{}", self.base_url, SEARCH_ENDPOINT);
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let value = http
            .get_json_with_auth(
                &url,
                Auth::Query {
                    name: "key",
                    value: api_key,
                },
                &request.query(),
                headers,
            )
            .await
            .map_err(classify)?;

        serde_json::from_value(value)
            .map_err(|e| FetchError::InvalidResponse(format!("search.list: {e}")))
    }
}

impl Default for YouTubeApiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
