//! Mailchimp Marketing API client.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, instrument};
use tributary_fetch::{Auth, FetchError, HttpClient};

use crate::cursor::rfc3339;

// ============================================================================
// Constants
// ============================================================================

/// Largest `count` the API accepts.
pub const MAX_COUNT: u32 = 1000;

/// Fields requested for each campaign.
const CAMPAIGN_FIELDS: &str = "campaigns.id,campaigns.type,campaigns.status,campaigns.create_time,\
campaigns.send_time,campaigns.archive_url,campaigns.long_archive_url,campaigns.emails_sent,\
campaigns.settings,campaigns.recipients.list_id,total_items";

// ============================================================================
// API Response Types
// ============================================================================

/// Response from `GET /campaigns`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignsResponse {
    /// Campaigns, kept raw.
    #[serde(default)]
    pub campaigns: Vec<serde_json::Value>,
    /// Total campaigns matching the filter.
    #[serde(default)]
    pub total_items: u64,
}

/// Extracts the data center from an API key (`<key>-us21` yields `us21`).
pub fn data_center(api_key: &str) -> Option<&str> {
    api_key
        .rsplit_once('-')
        .map(|(_, dc)| dc.trim())
        .filter(|dc| !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric()))
}

// ============================================================================
// Request
// ============================================================================

/// Parameters for one campaigns call.
#[derive(Debug, Clone, Default)]
pub struct CampaignsRequest<'a> {
    /// Page size.
    pub count: u32,
    /// Records to skip.
    pub offset: u32,
    /// Only campaigns created after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to one audience.
    pub list_id: Option<&'a str>,
}

impl CampaignsRequest<'_> {
    /// Query parameters.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("fields".to_string(), CAMPAIGN_FIELDS.to_string()),
            (
                "count".to_string(),
                self.count.clamp(1, MAX_COUNT).to_string(),
            ),
            ("offset".to_string(), self.offset.to_string()),
            ("sort_field".to_string(), "create_time".to_string()),
            ("sort_dir".to_string(), "ASC".to_string()),
        ];
        if let Some(since) = self.since {
            query.push(("since_create_time".to_string(), rfc3339(since)));
        }
        if let Some(list_id) = self.list_id {
            query.push(("list_id".to_string(), list_id.to_string()));
        }
        query
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Mailchimp API client.
#[derive(Debug, Clone, Default)]
pub struct MailchimpApiClient {
    base_url: Option<String>,
    server: Option<String>,
}

impl MailchimpApiClient {
    /// Creates a client that derives the host from the API key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the data center instead of reading it from the key.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Uses a fixed base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// API root for a key.
    pub fn base_url(&self, api_key: &str) -> Result<String, FetchError> {
        if let Some(base) = &self.base_url {
            return Ok(base.clone());
        }
        let dc = self
            .server
            .as_deref()
            .or_else(|| data_center(api_key))
            .ok_or_else(|| {
                FetchError::NotConfigured(
                    "mailchimp: API key has no data center suffix; set the `server` option"
                        .to_string(),
                )
            })?;
        Ok(format!("https://{dc}.api.mailchimp.com/3.0"))
    }

    /// Lists one page of campaigns.
    #[instrument(skip(self, http, api_key, request), fields(offset = request.offset))]
    pub async fn list_campaigns(
        &self,
        http: &HttpClient,
        api_key: &str,
        request: &CampaignsRequest<'_>,
    ) -> Result<CampaignsResponse, FetchError> {
        debug!("Fetching Mailchimp campaigns");

        let url = format!("{}/campaigns", self.base_url(api_key)?);
        let value = http
            .get_json_with_auth(
                &url,
                Auth::Basic {
                    user: "anystring",
                    secret: api_key,
                },
                &request.query(),
                HeaderMap::new(),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| FetchError::InvalidResponse(format!("campaigns: {e}")))
    }
}
