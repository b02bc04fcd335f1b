//! Cached, retried page fetching.
//!
//! Every network page request goes through [`PageFetcher::fetch`]:
//! 1. Derive the cache key from (provider, checkpoint, page size, scope)
//! 2. On a hit, return the cached page without touching the network
//! 3. Otherwise call the adapter under the retry strategy
//! 4. Store the page with the configured TTL tier

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, instrument};
use tributary_core::LeasedCredential;

use crate::adapter::{Page, ProviderAdapter};
use crate::cache::{CacheTtl, ResilientCache, keyed};
use crate::context::FetchContext;
use crate::retry::{RetryOutcome, RetryStrategy};

/// Fetches adapter pages through the cache and retry strategy.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    cache: Arc<ResilientCache>,
    retry: RetryStrategy,
    ttl: CacheTtl,
}

impl PageFetcher {
    /// Creates a fetcher.
    pub fn new(cache: Arc<ResilientCache>, retry: RetryStrategy) -> Self {
        Self {
            cache,
            retry,
            ttl: CacheTtl::Short,
        }
    }

    /// Creates a fetcher from the context's cache and settings.
    pub fn from_context(ctx: &FetchContext) -> Self {
        Self::new(ctx.cache.clone(), ctx.settings.retry.clone()).with_ttl(ctx.settings.page_ttl)
    }

    /// Sets the TTL tier for cached pages.
    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Logical cache key for a page request.
    pub fn cache_key(
        adapter: &dyn ProviderAdapter,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> String {
        keyed(
            adapter.kind().cli_name(),
            "page",
            &json!({
                "checkpoint": checkpoint,
                "page_size": page_size,
                "scope": adapter.cache_scope(),
            }),
        )
    }

    /// Fetches one page, consulting the cache first.
    #[instrument(
        skip(self, adapter, ctx, credential),
        fields(provider = %adapter.kind(), credential = %credential.id)
    )]
    pub async fn fetch(
        &self,
        adapter: &dyn ProviderAdapter,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> RetryOutcome<Page> {
        let start = Instant::now();
        let key = Self::cache_key(adapter, checkpoint, page_size);

        if let Some(mut page) = self.cache.get_json::<Page>(&key).await {
            debug!(records = page.len(), "Page served from cache");
            page.from_cache = true;
            page.units_consumed = 0;
            return RetryOutcome {
                result: Ok(page),
                attempts: Vec::new(),
                duration: start.elapsed(),
            };
        }

        let op_name = format!("{}.fetch_page", adapter.kind().cli_name());
        let outcome = self
            .retry
            .retry(&op_name, |_| {
                adapter.fetch_page(ctx, credential, checkpoint, page_size)
            })
            .await;

        if let Ok(page) = &outcome.result {
            debug!(
                records = page.len(),
                has_more = page.has_more,
                units = page.units_consumed,
                "Page fetched"
            );
            self.cache.set_json(&key, page, self.ttl).await;
        }

        outcome
    }

    /// The retry strategy in use.
    pub fn retry(&self) -> &RetryStrategy {
        &self.retry
    }

    /// The per-attempt timeout.
    pub fn attempt_timeout(&self) -> Duration {
        self.retry.attempt_timeout
    }
}
