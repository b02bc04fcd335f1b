//! GitHub REST API client.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, instrument};
use tributary_fetch::{Auth, FetchError, HttpClient};

// ============================================================================
// Constants
// ============================================================================

/// GitHub REST API base URL.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// API version header value.
const API_VERSION: &str = "2022-11-28";

/// Largest `per_page` the API accepts.
pub const MAX_PER_PAGE: u32 = 100;

// ============================================================================
// API Client
// ============================================================================

/// GitHub API client over the shared HTTP client.
#[derive(Debug, Clone)]
pub struct GitHubApiClient {
    base_url: String,
}

impl GitHubApiClient {
    /// Creates a client for api.github.com.
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_API_BASE)
    }

    /// Creates a client for GitHub Enterprise or a test server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Listing URL for an owner.
    pub fn repos_url(&self, owner_path: &str, owner: &str) -> String {
        format!("{}/{}/{}/repos", self.base_url, owner_path, owner)
    }

    /// Fetches one page of repositories, most recently updated first.
    #[instrument(skip(self, http, token))]
    pub async fn list_repos(
        &self,
        http: &HttpClient,
        token: &str,
        owner_path: &str,
        owner: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        debug!("Fetching GitHub repositories");

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let query = [
            ("sort".to_string(), "updated".to_string()),
            ("direction".to_string(), "desc".to_string()),
            (
                "per_page".to_string(),
                per_page.clamp(1, MAX_PER_PAGE).to_string(),
            ),
            ("page".to_string(), page.max(1).to_string()),
        ];

        let value = http
            .get_json_with_auth(
                &self.repos_url(owner_path, owner),
                Auth::Bearer(token),
                &query,
                headers,
            )
            .await
            .map_err(classify)?;

        match value {
            serde_json::Value::Array(items) => Ok(items),
            other => Err(FetchError::InvalidResponse(format!(
                "expected repository array, got {}",
                type_name(&other)
            ))),
        }
    }
}

impl Default for GitHubApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// GitHub reports primary rate limiting as 403 with a "rate limit" message.
pub(crate) fn classify(err: FetchError) -> FetchError {
    match err {
        FetchError::Status { status: 403, body } if body.to_lowercase().contains("rate limit") => {
            FetchError::RateLimited { retry_after: None }
        }
        other => other,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repos_url() {
        let client = GitHubApiClient::with_base_url("https://ghe.example.com/api/v3/");
        assert_eq!(
            client.repos_url("orgs", "rust-lang"),
            "https://ghe.example.com/api/v3/orgs/rust-lang/repos"
        );
    }

    #[test]
    fn test_rate_limit_403() {
        let err = classify(FetchError::Status {
            status: 403,
            body: r#"{"message":"API rate limit exceeded for 1.2.3.4."}"#.into(),
        });
        assert!(matches!(err, FetchError::RateLimited { .. }));

        let err = classify(FetchError::Status {
            status: 403,
            body: "Resource not accessible".into(),
        });
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }
}
