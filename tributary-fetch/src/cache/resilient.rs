//! Fail-open cache facade.
//!
//! [`ResilientCache`] wraps an optional [`CacheBackend`]. Backend failures
//! are logged and counted but never returned: a failed `get` is a miss, a
//! failed `set`/`delete` returns `false`, a failed `clear` removes nothing.
//! With no backend at all the cache is a pure pass-through that always
//! misses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, trace, warn};

use super::backend::CacheBackend;
use super::key::CacheTtl;
use crate::error::CacheError;

/// Default deadline for a single backend call.
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Stats
// ============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that found a value.
    pub hits: u64,
    /// Reads that found nothing (including failed reads).
    pub misses: u64,
    /// Successful writes.
    pub sets: u64,
    /// Successful deletes (keys removed).
    pub deletes: u64,
    /// Backend failures swallowed.
    pub errors: u64,
    /// Whether the last backend call succeeded.
    pub connected: bool,
}

impl CacheStats {
    /// Hits as a fraction of reads.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

// ============================================================================
// Resilient Cache
// ============================================================================

/// Namespaced, fail-open cache.
pub struct ResilientCache {
    backend: Option<Arc<dyn CacheBackend>>,
    prefix: String,
    op_timeout: Duration,
    counters: Counters,
    connected: AtomicBool,
}

impl ResilientCache {
    /// Creates a cache over `backend`, prefixing every key with `prefix`.
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend: Some(backend),
            prefix: prefix.into(),
            op_timeout: DEFAULT_OP_TIMEOUT,
            counters: Counters::default(),
            connected: AtomicBool::new(true),
        }
    }

    /// Creates a cache with no backend; every read misses.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            prefix: String::new(),
            op_timeout: DEFAULT_OP_TIMEOUT,
            counters: Counters::default(),
            connected: AtomicBool::new(false),
        }
    }

    /// Sets the per-call deadline.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Whether a backend is configured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// The backend name, or `"none"`.
    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("none", |b| b.name())
    }

    /// Whether the last backend call succeeded.
    pub fn is_connected(&self) -> bool {
        self.backend.is_some() && self.connected.load(Ordering::Relaxed)
    }

    /// Builds the physical key for a logical key.
    pub fn key(&self, logical: &str) -> String {
        format!("{}{logical}", self.prefix)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Reads a value. Any failure is reported as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let full = self.key(key);
        let value = self.call("get", |b| async move { b.get(&full).await }).await.flatten();

        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Cache miss");
        }
        value
    }

    /// Writes a value with a TTL. Returns `false` if it was not stored.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let full = self.key(key);
        let stored = self
            .call("set", |b| async move { b.set(&full, value, Some(ttl)).await })
            .await
            .is_some();

        if stored {
            self.counters.sets.fetch_add(1, Ordering::Relaxed);
        }
        stored
    }

    /// Removes a key. Returns `false` if nothing was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let full = self.key(key);
        let removed = self
            .call("delete", |b| async move { b.delete(&full).await })
            .await
            .unwrap_or(0);

        self.counters.deletes.fetch_add(removed, Ordering::Relaxed);
        removed > 0
    }

    /// Whether a key exists. Failures report `false`.
    pub async fn exists(&self, key: &str) -> bool {
        let full = self.key(key);
        self.call("exists", |b| async move { b.exists(&full).await })
            .await
            .unwrap_or(false)
    }

    /// Removes every key matching a glob pattern within this cache's
    /// prefix. Returns the number of keys removed.
    pub async fn clear(&self, pattern: &str) -> u64 {
        let full = self.key(pattern);
        let removed = self
            .call("clear", |b| async move { b.delete_matching(&full).await })
            .await
            .unwrap_or(0);

        self.counters.deletes.fetch_add(removed, Ordering::Relaxed);
        debug!(pattern = %pattern, removed, "Cache cleared");
        removed
    }

    /// Checks connectivity and updates the `connected` flag.
    pub async fn ping(&self) -> bool {
        self.call("ping", |b| async move { b.ping().await })
            .await
            .is_some()
    }

    /// Reads and decodes a JSON value. Undecodable values count as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encodes and writes a JSON value.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: CacheTtl) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl.duration()).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache value");
                false
            }
        }
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            connected: self.is_connected(),
        }
    }

    /// Runs one backend call under the deadline. `None` means there was
    /// no backend or the call failed.
    async fn call<'a, T, F, Fut>(&'a self, op: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&'a dyn CacheBackend) -> Fut,
        Fut: std::future::Future<Output = Result<T, CacheError>> + 'a,
    {
        let backend = self.backend.as_deref()?;

        let result = match tokio::time::timeout(self.op_timeout, f(backend)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        };

        match result {
            Ok(value) => {
                self.connected.store(true, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.connected.store(false, Ordering::Relaxed);
                warn!(op, backend = backend.name(), error = %e, "Cache backend failed, continuing without cache");
                None
            }
        }
    }
}

impl std::fmt::Debug for ResilientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCache")
            .field("backend", &self.backend_name())
            .field("prefix", &self.prefix)
            .field("stats", &self.stats())
            .finish()
    }
}
