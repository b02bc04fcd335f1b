//! Fetch context providing access to host APIs.
//!
//! The fetch context is passed to every adapter call and bundles the HTTP
//! client, the page cache and fetch settings.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheTtl, ResilientCache};
use crate::host::http::HttpClient;
use crate::retry::RetryStrategy;

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// HTTP timeout for a single request.
    pub timeout: Duration,
    /// Retry policy for page requests.
    pub retry: RetryStrategy,
    /// TTL tier for cached pages.
    pub page_ttl: CacheTtl,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let timeout = Duration::from_secs(30);
        Self {
            timeout,
            retry: RetryStrategy::default().with_attempt_timeout(timeout),
            page_ttl: CacheTtl::Short,
        }
    }
}

impl FetchSettings {
    /// Creates settings with custom timeout (applied to HTTP and retry).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.retry = self.retry.with_attempt_timeout(timeout);
        self
    }

    /// Creates settings with a custom retry strategy.
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to adapters, giving access to host APIs.
pub struct FetchContext {
    /// HTTP client with tracing.
    pub http: Arc<HttpClient>,
    /// Shared fail-open cache.
    pub cache: Arc<ResilientCache>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with default host API implementations and no cache.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns the effective timeout for fetch operations.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
#[derive(Default)]
pub struct FetchContextBuilder {
    http: Option<Arc<HttpClient>>,
    cache: Option<Arc<ResilientCache>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP client.
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the cache.
    pub fn cache(mut self, cache: Arc<ResilientCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the fetch settings.
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the retry strategy.
    pub fn retry(mut self, retry: RetryStrategy) -> Self {
        self.settings.retry = retry;
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_timeout(timeout);
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> FetchContext {
        let timeout = self.settings.timeout;
        FetchContext {
            http: self
                .http
                .unwrap_or_else(|| Arc::new(HttpClient::with_timeout(timeout))),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(ResilientCache::disabled())),
            settings: self.settings,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
