//! Wires the sync engine together from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tributary_core::{ProviderKind, SystemClock};
use tributary_fetch::{FetchContext, RedisCacheBackend, ResilientCache, SystemKeychain};
use tributary_providers::{ProviderOptions, ProviderRegistry};
use tributary_store::{
    CacheConfig, Config, CredentialRotator, JobHistory, JsonCheckpointStorage, JsonLedgerStorage,
    SqliteContentStore,
};
use tributary_sync::{SyncOrchestrator, SyncSettings};

/// Builds the page cache. A bad URL disables caching instead of failing.
pub fn build_cache(config: &CacheConfig) -> ResilientCache {
    let url = match (&config.redis_url, config.enabled) {
        (Some(url), true) => url,
        _ => {
            debug!("Page cache disabled");
            return ResilientCache::disabled();
        }
    };

    match RedisCacheBackend::open(url) {
        Ok(backend) => {
            let backend =
                backend.with_timeouts(config.connect_timeout(), config.command_timeout());
            ResilientCache::new(Arc::new(backend), config.key_prefix.clone())
                .with_op_timeout(config.command_timeout())
        }
        Err(e) => {
            warn!(error = %e, "Invalid Redis URL, page cache disabled");
            ResilientCache::disabled()
        }
    }
}

/// Sync settings with page sizes clamped to what each API accepts.
pub fn build_settings(config: &Config) -> SyncSettings {
    let mut settings = SyncSettings::from_config(config);
    for desc in ProviderRegistry::all() {
        let requested = config
            .provider(desc.id)
            .and_then(|p| p.page_size)
            .unwrap_or(desc.metadata.default_page_size);
        settings = settings.with_page_size(desc.id, desc.clamp_page_size(requested));
    }
    settings
}

fn default_daily_limit(kind: ProviderKind) -> u64 {
    ProviderRegistry::get(kind).map_or(0, |d| d.metadata.default_daily_limit)
}

/// Builds the orchestrator with every enabled provider.
///
/// Providers whose adapter cannot be built (missing channel id, owner,
/// ...) are left out with a warning; asking for them later reports them
/// as not configured.
pub async fn build_orchestrator(config: &Config) -> Result<Arc<SyncOrchestrator>> {
    let settings = build_settings(config);

    let ctx = FetchContext::builder()
        .cache(Arc::new(build_cache(&config.cache)))
        .timeout(Duration::from_secs(config.sync.request_timeout_secs.max(1)))
        .retry(settings.retry.clone())
        .build();

    let pools = config
        .credential_pools(&SystemKeychain::new(), default_daily_limit)
        .await;
    let clock = Arc::new(SystemClock);
    let ledger = Arc::new(JsonLedgerStorage::new(config.ledger_dir()));
    let rotator = CredentialRotator::new(ledger, clock.clone())
        .with_soft_limit_ratio(config.sync.soft_limit_ratio)
        .with_pools(pools);

    let sqlite_path = config.sqlite_path();
    let store = SqliteContentStore::open(&sqlite_path)
        .with_context(|| format!("Failed to open content store at {}", sqlite_path.display()))?;
    let history = JobHistory::load(config.history_path())
        .await
        .context("Failed to load job history")?;

    let mut builder = SyncOrchestrator::builder()
        .context(Arc::new(ctx))
        .rotator(Arc::new(rotator))
        .checkpoints(Arc::new(JsonCheckpointStorage::new(config.checkpoint_path())))
        .store(Arc::new(store))
        .history(Arc::new(history))
        .clock(clock)
        .settings(settings);

    for kind in config.enabled_providers() {
        let options = config
            .provider(kind)
            .map(|p| ProviderOptions::new(p.options.clone()))
            .unwrap_or_default();
        match ProviderRegistry::build_adapter(kind, &options) {
            Ok(adapter) => builder = builder.adapter(adapter),
            Err(e) => warn!(provider = %kind, error = %e, "Provider skipped"),
        }
    }

    let orchestrator = builder.build()?;
    info!(providers = ?orchestrator.providers(), "Sync engine ready");
    Ok(Arc::new(orchestrator))
}
