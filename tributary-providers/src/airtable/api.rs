//! Airtable Web API client.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, instrument};
use tributary_fetch::{Auth, FetchError, HttpClient};

use crate::cursor::rfc3339;

// ============================================================================
// Constants
// ============================================================================

/// Airtable API base URL.
pub const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

/// Largest `pageSize` the API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// API Response Types
// ============================================================================

/// Response from the list records endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRecordsResponse {
    /// Records, kept raw.
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
    /// Offset for the next page, absent on the last page.
    #[serde(default)]
    pub offset: Option<String>,
}

// ============================================================================
// Request
// ============================================================================

/// Parameters for one list call.
#[derive(Debug, Clone, Default)]
pub struct ListRequest<'a> {
    /// Page size.
    pub page_size: u32,
    /// Native offset.
    pub offset: Option<&'a str>,
    /// Optional view name.
    pub view: Option<&'a str>,
    /// Only records modified after this instant.
    pub modified_after: Option<DateTime<Utc>>,
}

impl ListRequest<'_> {
    /// Query parameters.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = vec![(
            "pageSize".to_string(),
            self.page_size.clamp(1, MAX_PAGE_SIZE).to_string(),
        )];
        if let Some(offset) = self.offset {
            query.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(view) = self.view {
            query.push(("view".to_string(), view.to_string()));
        }
        if let Some(after) = self.modified_after {
            query.push((
                "filterByFormula".to_string(),
                format!("IS_AFTER(LAST_MODIFIED_TIME(), '{}')", rfc3339(after)),
            ));
        }
        query
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Airtable API client.
#[derive(Debug, Clone)]
pub struct AirtableApiClient {
    base_url: String,
}

impl AirtableApiClient {
    /// Creates a client for the public API.
    pub fn new() -> Self {
        Self::with_base_url(AIRTABLE_API_BASE)
    }

    /// Creates a client for a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Table URL. Table names may contain spaces.
    pub fn table_url(&self, base_id: &str, table: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            base_id,
            table.replace(' ', "%20")
        )
    }

    /// Lists one page of records.
    #[instrument(skip(self, http, token, request))]
    pub async fn list_records(
        &self,
        http: &HttpClient,
        token: &str,
        base_id: &str,
        table: &str,
        request: &ListRequest<'_>,
    ) -> Result<ListRecordsResponse, FetchError> {
        debug!(offset = ?request.offset, "Fetching Airtable records");

        let value = http
            .get_json_with_auth(
                &self.table_url(base_id, table),
                Auth::Bearer(token),
                &request.query(),
                HeaderMap::new(),
            )
            .await
            .map_err(classify)?;

        serde_json::from_value(value)
            .map_err(|e| FetchError::InvalidResponse(format!("list records: {e}")))
    }
}

impl Default for AirtableApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// An expired offset comes back as 422 `LIST_RECORDS_ITERATOR_NOT_AVAILABLE`.
fn classify(err: FetchError) -> FetchError {
    match err {
        FetchError::Status { status: 422, body }
            if body.contains("LIST_RECORDS_ITERATOR_NOT_AVAILABLE") =>
        {
            FetchError::InvalidCursor("airtable offset expired".to_string())
        }
        other => other,
    }
}
