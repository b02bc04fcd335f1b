//! Cache backend trait and in-process backends.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::CacheError;

// ============================================================================
// Backend Trait
// ============================================================================

/// A key-value store with optional expiry.
///
/// Backends report every failure; the [`super::ResilientCache`] facade
/// decides what callers see.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name for logs and stats.
    fn name(&self) -> &'static str;

    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes a value, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Removes a key, returning how many keys were removed.
    async fn delete(&self, key: &str) -> Result<u64, CacheError>;

    /// Whether a live key exists.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key matching a glob pattern (`*` and `?`).
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Checks connectivity.
    async fn ping(&self) -> Result<(), CacheError>;
}

// ============================================================================
// Memory Backend
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// An in-process backend. Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCacheBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|m| m.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Command("memory cache poisoned".to_string()))
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut map = self.lock()?;
        let now = Instant::now();
        match map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|t| Instant::now() + t);
        self.lock()?.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        Ok(u64::from(self.lock()?.remove(key).is_some()))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|k, _| !glob_match(pattern, k));
        Ok((before - map.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// ============================================================================
// Unreachable Backend
// ============================================================================

/// A backend whose every call fails, as if the server were down.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableCacheBackend;

#[async_trait]
impl CacheBackend for UnreachableCacheBackend {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn delete(&self, _key: &str) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }
}

// ============================================================================
// Glob Matching
// ============================================================================

/// Redis-style glob match supporting `*` and `?`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
