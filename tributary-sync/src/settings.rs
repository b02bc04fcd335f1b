//! Orchestrator settings.

use std::collections::HashMap;
use std::time::Duration;

use tributary_core::ProviderKind;
use tributary_fetch::RetryStrategy;
use tributary_store::{Config, SyncConfig};

/// Ten years; longer windows are clamped.
const MAX_BACKOFF_WINDOW_SECS: u64 = 10 * 365 * 24 * 3600;

/// Tuning knobs for sync runs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Records per page unless a provider override exists.
    pub page_size: u32,
    /// Per-provider page sizes.
    pub page_sizes: HashMap<ProviderKind, u32>,
    /// Retry policy for page fetches.
    pub retry: RetryStrategy,
    /// Failures tolerated before non-forced runs back off.
    pub failure_threshold: u32,
    /// How long back-off lasts after the last failure.
    pub backoff_window: chrono::Duration,
    /// Stop a run after this many pages; the next run resumes.
    pub max_pages_per_run: u32,
    /// Deadline for a single content-store write.
    pub store_timeout: Duration,
    /// Scheduler tick.
    pub interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl SyncSettings {
    /// Builds settings from the `sync` config section.
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        let retry = RetryStrategy::new(config.max_retries)
            .with_base_delay(Duration::from_millis(config.base_retry_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_retry_delay_ms))
            .with_attempt_timeout(Duration::from_secs(config.request_timeout_secs));

        Self {
            page_size: config.page_size.max(1),
            page_sizes: HashMap::new(),
            retry,
            failure_threshold: config.failure_threshold,
            backoff_window: chrono::Duration::seconds(
                i64::try_from(config.backoff_window_secs.min(MAX_BACKOFF_WINDOW_SECS))
                    .unwrap_or_default(),
            ),
            max_pages_per_run: config.max_pages_per_run.max(1),
            store_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            interval: Duration::from_secs(config.interval_secs.max(1)),
        }
    }

    /// Builds settings from a full config, including provider page sizes.
    pub fn from_config(config: &Config) -> Self {
        let mut settings = Self::from_sync_config(&config.sync);
        for kind in ProviderKind::all() {
            if let Some(size) = config.provider(*kind).and_then(|p| p.page_size) {
                settings.page_sizes.insert(*kind, size.max(1));
            }
        }
        settings
    }

    /// Overrides one provider's page size.
    #[must_use]
    pub fn with_page_size(mut self, provider: ProviderKind, page_size: u32) -> Self {
        self.page_sizes.insert(provider, page_size.max(1));
        self
    }

    /// Sets the retry strategy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the failure threshold and back-off window.
    #[must_use]
    pub fn with_backoff(mut self, threshold: u32, window: chrono::Duration) -> Self {
        self.failure_threshold = threshold;
        self.backoff_window = window;
        self
    }

    /// Sets the per-run page limit.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages_per_run = max_pages.max(1);
        self
    }

    /// Effective page size for a provider.
    pub fn page_size_for(&self, provider: ProviderKind) -> u32 {
        self.page_sizes
            .get(&provider)
            .copied()
            .unwrap_or(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_store::ProviderConfig;

    #[test]
    fn test_from_sync_config() {
        let config = SyncConfig {
            max_retries: 5,
            base_retry_delay_ms: 100,
            backoff_window_secs: 60,
            ..SyncConfig::default()
        };
        let settings = SyncSettings::from_sync_config(&config);

        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(100));
        assert_eq!(settings.backoff_window, chrono::Duration::seconds(60));
        assert_eq!(settings.page_size, 50);
    }

    #[test]
    fn test_provider_page_size_override() {
        let mut config = Config::default();
        config.providers.insert(
            "github".into(),
            ProviderConfig {
                page_size: Some(100),
                ..ProviderConfig::default()
            },
        );

        let settings = SyncSettings::from_config(&config);
        assert_eq!(settings.page_size_for(ProviderKind::GitHub), 100);
        assert_eq!(settings.page_size_for(ProviderKind::YouTube), 50);
    }
}
