//! Retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{IngestError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(4);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Attempt budget and backoff curve for one unit of work
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Seconds scaled by `2^(attempt - 1)` before clamping
    pub multiplier: f64,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Which errors are worth another attempt
    pub retry_on: fn(&IngestError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: 1.0,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            retry_on: IngestError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    /// Delay after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.multiplier * 2f64.powi(exponent);
        let raw = Duration::try_from_secs_f64(secs).unwrap_or(self.max_backoff);
        raw.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out. An exhausted budget surfaces as `Fetch`.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !(self.retry_on)(&err) {
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!("{} failed after {} attempts: {}", what, attempt, err);
                return Err(IngestError::fetch(format!(
                    "{} failed after {} attempts: {}",
                    what, attempt, err
                )));
            }

            let delay = self.backoff(attempt);
            warn!("{} attempt {}/{} failed: {}", what, attempt, max_attempts, err);
            info!("Retrying in {:?}...", delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_clamped() {
        let policy = RetryPolicy::default();
        // 1s and 2s raised to the floor, 16s capped at the ceiling
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("chunk", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(IngestError::transient("http://test", "503 Service Unavailable"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_is_promoted_to_fetch_error() {
        let calls = AtomicU32::new(0);

        let err = RetryPolicy::default()
            .run("chunk", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(IngestError::transient("http://test", "timed out"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            IngestError::Fetch(msg) => assert!(msg.contains("after 3 attempts")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let calls = AtomicU32::new(0);

        let err = RetryPolicy::default()
            .run("chunk", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(IngestError::fetch("404 Not Found"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, IngestError::Fetch(msg) if msg == "404 Not Found"));
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let err = RetryPolicy::none()
            .run("chunk", || async {
                Err::<(), _>(IngestError::transient("http://test", "reset"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
    }
}
