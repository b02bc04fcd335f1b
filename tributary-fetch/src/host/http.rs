//! HTTP client with tracing and domain allowlist.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist for security
//! - JSON helpers that turn provider status codes into [`FetchError`]s

use reqwest::{Client, Response, StatusCode, header, header::HeaderMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{FetchError, HttpError};

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for Tributary.
const USER_AGENT: &str = concat!("Tributary/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in a [`FetchError::Status`].
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Auth
// ============================================================================

/// How a request authenticates.
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`.
    Bearer(&'a str),
    /// HTTP basic auth with a username and the token as password.
    Basic {
        /// Username (often ignored by the provider).
        user: &'a str,
        /// Password or API key.
        secret: &'a str,
    },
    /// Token passed as a query parameter.
    Query {
        /// Parameter name.
        name: &'a str,
        /// Token value.
        value: &'a str,
    },
}

impl std::fmt::Debug for Auth<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Basic { user, .. } => write!(f, "Basic({user}, <redacted>)"),
            Self::Query { name, .. } => write!(f, "Query({name}=<redacted>)"),
        }
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// If the configured client cannot be built (broken TLS setup), a
    /// default client is used and a warning is logged.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build configured HTTP client, using defaults");
                Client::new()
            });

        Self {
            inner: client,
            allowed_domains: None,
        }
    }

    /// Restricts requests to the given domains (and their subdomains).
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(()); // No restrictions
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request");

        let response = self.inner.get(url).send().await.map_err(map_reqwest)?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs an authenticated GET with query parameters.
    #[instrument(skip(self, auth, query, headers), fields(url = %url))]
    pub async fn get_with_auth(
        &self,
        url: &str,
        auth: Auth<'_>,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!(params = query.len(), "GET request with auth");

        let mut request = self.inner.get(url).headers(headers).query(query);
        request = match auth {
            Auth::Bearer(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            Auth::Basic { user, secret } => request.basic_auth(user, Some(secret)),
            Auth::Query { name, value } => request.query(&[(name, value)]),
        };

        let response = request.send().await.map_err(map_reqwest)?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs an authenticated GET and decodes the JSON body.
    ///
    /// Non-success statuses become [`FetchError`]s: 401 is an
    /// authentication failure, 429 is rate limiting (with `Retry-After`),
    /// everything else is [`FetchError::Status`] carrying a truncated body so
    /// adapters can recognise provider-specific conditions.
    pub async fn get_json_with_auth(
        &self,
        url: &str,
        auth: Auth<'_>,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<serde_json::Value, FetchError> {
        let response = self.get_with_auth(url, auth, query, headers).await?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if response.is_rate_limited() {
            return Err(FetchError::RateLimited {
                retry_after: response.retry_after_secs(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();

        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthenticationFailed(body));
        }

        Err(FetchError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Request(err)
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// Check if the response indicates rate limiting.
    fn is_rate_limited(&self) -> bool;

    /// Get the Retry-After header value in seconds.
    fn retry_after_secs(&self) -> Option<u64>;
}

impl ResponseExt for Response {
    fn is_rate_limited(&self) -> bool {
        self.status() == StatusCode::TOO_MANY_REQUESTS
    }

    fn retry_after_secs(&self) -> Option<u64> {
        self.headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_allowlist() {
        let client = HttpClient::new().with_allowed_domains(vec![
            "googleapis.com".to_string(),
            "api.github.com".to_string(),
        ]);

        assert!(client
            .is_domain_allowed("https://www.googleapis.com/youtube/v3/search")
            .is_ok());
        assert!(client.is_domain_allowed("https://api.github.com/orgs/rust-lang/repos").is_ok());

        assert!(client.is_domain_allowed("https://evil.com/steal").is_err());
    }

    #[test]
    fn test_no_domain_restrictions() {
        let client = HttpClient::new();
        assert!(client.is_domain_allowed("https://any.domain.com").is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let client = HttpClient::new().with_allowed_domains(vec!["example.com".to_string()]);
        assert!(client.is_domain_allowed("not-a-valid-url").is_err());
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let auth = Auth::Basic {
            user: "anystring",
            secret: "key-us6",
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("key-us6"));

        let debug = format!("{:?}", Auth::Bearer("ghp_secret"));
        assert!(!debug.contains("ghp_secret"));
    }
}
