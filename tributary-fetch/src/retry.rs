//! Retry strategies for provider requests.
//!
//! [`RetryStrategy::retry`] runs an operation up to `max_attempts` times,
//! bounding every attempt with a timeout and sleeping with exponential
//! backoff between retryable failures. Each attempt is recorded so callers
//! can report what happened.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::FetchError;

// ============================================================================
// Attempt Records
// ============================================================================

/// Record of a single attempt.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Error if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl FetchAttempt {
    /// Creates a successful attempt record.
    pub fn success(attempt: u32, duration: Duration) -> Self {
        Self {
            attempt,
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(attempt: u32, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            attempt,
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

/// The outcome of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The result (success or final error).
    pub result: Result<T, FetchError>,
    /// All attempts made.
    pub attempts: Vec<FetchAttempt>,
    /// Total duration including backoff sleeps.
    pub duration: Duration,
}

impl<T> RetryOutcome<T> {
    /// Returns true if the operation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the number of attempts made.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns all errors that occurred.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref())
            .collect()
    }
}

// ============================================================================
// Retry Strategy
// ============================================================================

/// Strategy for retrying failed requests.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of attempts (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Whether to use exponential backoff.
    pub exponential_backoff: bool,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
}

impl RetryStrategy {
    /// Creates a new retry strategy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
            exponential_backoff: true,
            max_delay: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(30),
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            exponential_backoff: false,
            max_delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Enables or disables exponential backoff.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Calculates the delay after a given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        };

        delay.min(self.max_delay)
    }

    /// Determines if an error should be retried.
    pub fn should_retry(&self, error: &FetchError) -> bool {
        error.is_retryable()
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. An attempt that exceeds
    /// `attempt_timeout` is abandoned and counts as a retryable
    /// [`FetchError::Timeout`]. A `RateLimited` error with a `retry_after`
    /// hint waits at least that long (capped by `max_delay`).
    pub async fn retry<T, F, Fut>(&self, op_name: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let attempt_start = Instant::now();

            let result = match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(self.attempt_timeout.as_secs())),
            };

            match result {
                Ok(value) => {
                    attempts.push(FetchAttempt::success(attempt, attempt_start.elapsed()));
                    debug!(op = %op_name, attempt, "Operation succeeded");
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        duration: start.elapsed(),
                    };
                }
                Err(e) => {
                    attempts.push(FetchAttempt::failure(
                        attempt,
                        e.to_string(),
                        attempt_start.elapsed(),
                    ));

                    if attempt >= self.max_attempts || !self.should_retry(&e) {
                        warn!(op = %op_name, attempt, error = %e, "Operation failed, giving up");
                        return RetryOutcome {
                            result: Err(e),
                            attempts,
                            duration: start.elapsed(),
                        };
                    }

                    let mut delay = self.delay_for_attempt(attempt);
                    if let FetchError::RateLimited {
                        retry_after: Some(secs),
                    } = e
                    {
                        delay = delay.max(Duration::from_secs(secs)).min(self.max_delay);
                    }

                    warn!(
                        op = %op_name,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryStrategy {
        RetryStrategy::new(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_attempt_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_exponential_backoff() {
        let strategy = RetryStrategy::default();

        assert_eq!(strategy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(strategy.delay_for_attempt(4), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let strategy = RetryStrategy::new(10).with_base_delay(Duration::from_secs(10));

        // Should be capped at 60 seconds
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let outcome = fast(3)
            .retry("flaky", move |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(FetchError::Status {
                            status: 502,
                            body: "bad gateway".into(),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.as_ref().unwrap(), &7);
        assert_eq!(outcome.attempts_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let outcome: RetryOutcome<()> = fast(5)
            .retry("auth", |_| async {
                Err(FetchError::AuthenticationFailed("nope".into()))
            })
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts_count(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let outcome: RetryOutcome<()> = fast(3)
            .retry("down", |_| async { Err(FetchError::Timeout(1)) })
            .await;

        assert_eq!(outcome.attempts_count(), 3);
        assert_eq!(outcome.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let strategy = fast(2).with_attempt_timeout(Duration::from_millis(10));
        let outcome: RetryOutcome<()> = strategy
            .retry("slow", |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(outcome.result, Err(FetchError::Timeout(_))));
        assert_eq!(outcome.attempts_count(), 2);
    }
}
