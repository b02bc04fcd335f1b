//! Redis cache backend.
//!
//! The connection is established lazily on first use and dropped on any
//! connection-level failure so the next call reconnects. Every command is
//! bounded by `command_timeout`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::backend::CacheBackend;
use crate::error::CacheError;

/// Keys fetched per `SCAN` round trip.
const SCAN_COUNT: usize = 200;

/// Cache backend backed by a Redis server.
pub struct RedisCacheBackend {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RedisCacheBackend {
    /// Creates a backend for `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// Only the URL is validated here; no connection is made until the
    /// first command.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_millis(500),
        })
    }

    /// Sets the connect and per-command timeouts.
    pub fn with_timeouts(mut self, connect: Duration, command: Duration) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        debug!("Connecting to Redis");
        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.connect_timeout))??;

        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Runs a command under the command timeout, dropping the connection
    /// if it failed at the connection level.
    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let result = match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::from(e)),
            Err(_) => Err(CacheError::Timeout(self.command_timeout)),
        };

        if matches!(result, Err(CacheError::Connection(_) | CacheError::Timeout(_))) {
            self.conn.lock().await.take();
        }
        result
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    #[instrument(level = "trace", skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                self.bounded(async move { conn.set_ex::<_, _, ()>(key, value, secs).await })
                    .await
            }
            None => {
                self.bounded(async move { conn.set::<_, _, ()>(key, value).await })
                    .await
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.del::<_, u64>(key).await }).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.exists::<_, bool>(key).await })
            .await
    }

    /// Uses `SCAN` (never `KEYS`) so large keyspaces are not blocked.
    #[instrument(level = "debug", skip(self))]
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut removed = 0u64;
        let mut cursor = 0u64;

        loop {
            let mut conn = self.connection().await?;
            let (next, keys): (u64, Vec<String>) = self
                .bounded(async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_COUNT)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            if !keys.is_empty() {
                let mut conn = self.connection().await?;
                let n: u64 = self
                    .bounded(async move { conn.del::<_, u64>(keys).await })
                    .await?;
                removed += n;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern = %pattern, removed, "Cleared matching keys");
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(RedisCacheBackend::open("not a url").is_err());
        assert!(RedisCacheBackend::open("redis://127.0.0.1:6379/0").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_errors_quickly() {
        // Port 1 is never a Redis server.
        let backend = RedisCacheBackend::open("redis://127.0.0.1:1/0")
            .unwrap()
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));

        assert!(backend.get("k").await.is_err());
        assert!(backend.ping().await.is_err());
    }
}
