//! Shared fixtures for orchestrator and scheduler tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tributary_core::{
    Clock, ContentKind, ContentRecord, FixedClock, LeasedCredential, ProviderKind, QuotaLedger,
    RawRecord,
};
use tributary_fetch::{
    FetchContext, FetchError, MemoryCacheBackend, Page, ProviderAdapter, ResilientCache,
    RetryStrategy, UnreachableCacheBackend,
};
use tributary_store::{
    CredentialRotator, JobHistory, MemoryCheckpointStorage, MemoryContentStore,
    MemoryLedgerStorage, PooledCredential,
};
use tributary_sync::{SyncOrchestrator, SyncSettings};

// ============================================================================
// Scripted Adapter
// ============================================================================

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    /// A page with these raw payloads.
    Records(Vec<Value>),
    /// The provider answers with this HTTP status.
    Status(u16),
}

/// Adapter that replays a fixed list of pages.
///
/// The cursor is the index of the next page as a decimal string; no cursor
/// means page 0.
pub struct ScriptedAdapter {
    kind: ProviderKind,
    steps: Mutex<Vec<Step>>,
    units: u64,
    calls: AtomicU32,
    failing: AtomicBool,
    spent: Mutex<HashSet<String>>,
    seen_credentials: Mutex<Vec<String>>,
    gate: Option<Gate>,
}

/// Holds the first fetch until released.
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
    armed: AtomicBool,
}

impl ScriptedAdapter {
    pub fn new(kind: ProviderKind, steps: Vec<Step>) -> Self {
        Self {
            kind,
            steps: Mutex::new(steps),
            units: 1,
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(false),
            spent: Mutex::new(HashSet::new()),
            seen_credentials: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// `pages` pages of `per_page` well-formed records each.
    pub fn paged(kind: ProviderKind, pages: usize, per_page: usize) -> Self {
        let steps = (0..pages)
            .map(|p| {
                Step::Records(
                    (0..per_page)
                        .map(|i| json!({"id": format!("p{p}-r{i}"), "title": format!("Item {p}.{i}")}))
                        .collect(),
                )
            })
            .collect();
        Self::new(kind, steps)
    }

    pub fn with_units(mut self, units: u64) -> Self {
        self.units = units;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Gate {
            entered: Notify::new(),
            release: Notify::new(),
            armed: AtomicBool::new(true),
        });
        self
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("adapter is not gated")
    }

    /// Makes every fetch fail with a 503 until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The provider reports this credential's quota as spent.
    pub fn spend(&self, credential: &str) {
        self.spent.lock().unwrap().insert(credential.to_string());
    }

    pub fn set_steps(&self, steps: Vec<Step>) {
        *self.steps.lock().unwrap() = steps;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_credentials(&self) -> Vec<String> {
        self.seen_credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_page(
        &self,
        _ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        _page_size: u32,
    ) -> Result<Page, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials
            .lock()
            .unwrap()
            .push(credential.id.clone());

        if let Some(gate) = &self.gate {
            if gate.armed.swap(false, Ordering::SeqCst) {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        if self.spent.lock().unwrap().contains(&credential.id) {
            return Err(FetchError::QuotaExceeded(format!(
                "daily quota spent for {}",
                credential.id
            )));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }

        let index: usize = match checkpoint {
            Some(c) => c
                .parse()
                .map_err(|_| FetchError::InvalidCursor(c.to_string()))?,
            None => 0,
        };
        let steps = self.steps.lock().unwrap().clone();
        let Some(step) = steps.get(index) else {
            return Ok(Page::empty(checkpoint.map(String::from), self.units));
        };

        match step {
            Step::Records(payloads) => Ok(Page::new(
                payloads
                    .iter()
                    .map(|p| RawRecord::new(self.kind, p.clone()))
                    .collect(),
                Some((index + 1).to_string()),
                index + 1 < steps.len(),
                self.units,
            )),
            Step::Status(status) => Err(FetchError::Status {
                status: *status,
                body: "scripted".into(),
            }),
        }
    }

    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
        let id = raw.id_at("/id")?;
        Some(ContentRecord::new(
            self.kind,
            id,
            ContentKind::Document,
            raw.str_at("/title"),
        ))
    }

    fn units_per_page(&self) -> u64 {
        self.units
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub adapter: Arc<ScriptedAdapter>,
    pub store: Arc<MemoryContentStore>,
    pub checkpoints: Arc<MemoryCheckpointStorage>,
    pub ledger: Arc<MemoryLedgerStorage>,
    pub history: Arc<JobHistory>,
    pub rotator: Arc<CredentialRotator>,
    pub clock: Arc<FixedClock>,
}

pub struct HarnessBuilder {
    adapters: Vec<Arc<ScriptedAdapter>>,
    limits: Vec<u64>,
    store: MemoryContentStore,
    settings: SyncSettings,
    cache: CacheSetup,
    seeded_usage: Vec<(String, u64)>,
}

/// Page cache the harness wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSetup {
    Disabled,
    Memory,
    /// Configured, but every backend call fails.
    Down,
}

pub fn fast_retry() -> RetryStrategy {
    RetryStrategy::new(3)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(2))
        .with_attempt_timeout(Duration::from_secs(5))
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

impl HarnessBuilder {
    pub fn new(adapter: ScriptedAdapter) -> Self {
        Self {
            adapters: vec![Arc::new(adapter)],
            limits: vec![10_000],
            store: MemoryContentStore::new(),
            settings: SyncSettings::default().with_retry(fast_retry()),
            cache: CacheSetup::Disabled,
            seeded_usage: Vec::new(),
        }
    }

    /// Adds another provider's adapter.
    pub fn also(mut self, adapter: ScriptedAdapter) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Daily limits of credentials `c0`, `c1`, ... in rotation order.
    pub fn credentials(mut self, limits: &[u64]) -> Self {
        self.limits = limits.to_vec();
        self
    }

    pub fn used(mut self, credential: &str, units: u64) -> Self {
        self.seeded_usage.push((credential.to_string(), units));
        self
    }

    pub fn store(mut self, store: MemoryContentStore) -> Self {
        self.store = store;
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache = CacheSetup::Memory;
        self
    }

    pub fn cache_down(mut self) -> Self {
        self.cache = CacheSetup::Down;
        self
    }

    pub async fn build(self) -> Harness {
        let clock = Arc::new(FixedClock::new(start_time()));
        let ledger = Arc::new(MemoryLedgerStorage::new());
        let checkpoints = Arc::new(MemoryCheckpointStorage::new());
        let store = Arc::new(self.store);
        let history = Arc::new(JobHistory::in_memory());

        let pool: Vec<PooledCredential> = self
            .limits
            .iter()
            .enumerate()
            .map(|(i, limit)| PooledCredential::new(format!("c{i}"), format!("token-{i}"), *limit))
            .collect();

        for adapter in &self.adapters {
            if self.seeded_usage.is_empty() {
                continue;
            }
            let mut seeded = QuotaLedger::new(adapter.kind());
            for (id, units) in &self.seeded_usage {
                seeded.entry(id, clock.today()).used_today = *units;
            }
            ledger.insert(seeded).await;
        }

        let rotator = Arc::new(
            CredentialRotator::new(ledger.clone(), clock.clone()).with_pools(
                self.adapters
                    .iter()
                    .map(|a| (a.kind(), pool.clone()))
                    .collect::<Vec<_>>(),
            ),
        );

        let cache = match self.cache {
            CacheSetup::Disabled => ResilientCache::disabled(),
            CacheSetup::Memory => {
                ResilientCache::new(Arc::new(MemoryCacheBackend::new()), "test:")
            }
            CacheSetup::Down => ResilientCache::new(Arc::new(UnreachableCacheBackend), "test:"),
        };
        let ctx = FetchContext::builder()
            .cache(Arc::new(cache))
            .retry(fast_retry())
            .build();

        let mut builder = SyncOrchestrator::builder()
            .context(Arc::new(ctx))
            .rotator(rotator.clone())
            .checkpoints(checkpoints.clone())
            .store(store.clone())
            .history(history.clone())
            .clock(clock.clone())
            .settings(self.settings);
        for adapter in &self.adapters {
            builder = builder.adapter(adapter.clone());
        }

        Harness {
            orchestrator: Arc::new(builder.build().unwrap()),
            adapter: self.adapters[0].clone(),
            store,
            checkpoints,
            ledger,
            history,
            rotator,
            clock,
        }
    }
}
