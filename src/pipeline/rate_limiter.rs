//! Request throttling and bounded retry for per-item adapter loops
//!
//! One `RetryPolicy` is shared by every adapter: a fixed cool-down after a
//! rate-limit signal, then the identical request again, never more than
//! `max_attempts` in total. No exponential backoff, so the worst-case run
//! time stays predictable.

use super::error::SourceError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};

/// Retry policy parameterized by attempts, cool-down and a retryable predicate
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first request
    pub max_attempts: u32,
    /// Pause before retrying a retryable failure
    pub cool_down: Duration,
    pub retryable: fn(&SourceError) -> bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cool_down: Duration, retryable: fn(&SourceError) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cool_down,
            retryable,
        }
    }

    /// Single retry after `cool_down`, only on rate-limit responses
    pub fn rate_limit(cool_down: Duration) -> Self {
        Self::new(2, cool_down, SourceError::is_rate_limited)
    }

    /// Never retry
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, |_| false)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("cool_down", &self.cool_down)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::rate_limit(Duration::from_secs(60))
    }
}

/// Minimum inter-request interval plus retry policy
///
/// Requests are serialized: the interval lock is held for the whole attempt
/// so only one request is in flight per limiter.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    policy: RetryPolicy,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, policy: RetryPolicy) -> Self {
        Self {
            min_interval,
            policy,
            next_allowed: Mutex::new(None),
        }
    }

    /// No throttling, no retries (bulk downloads)
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, RetryPolicy::none())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op`, honouring the interval and retrying per the policy
    ///
    /// `label` identifies the item in logs (ticker, page number).
    /// Returns the last error once attempts are exhausted; the caller skips
    /// the item.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut next_allowed = self.next_allowed.lock().await;
        let mut attempt = 1;

        loop {
            if let Some(at) = *next_allowed {
                sleep_until(at).await;
            }

            let result = op().await;
            *next_allowed = Some(Instant::now() + self.min_interval);

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_attempts && (self.policy.retryable)(&e) => {
                    log::warn!(
                        "⏳ {}: {} - cooling down {}s before retry {} of {}",
                        label,
                        e,
                        self.policy.cool_down.as_secs(),
                        attempt,
                        self.policy.max_attempts - 1
                    );
                    sleep(self.policy.cool_down).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        log::warn!("⚠️  {}: giving up after {} attempts: {}", label, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_limiter() -> RateLimiter {
        RateLimiter::new(
            Duration::from_millis(1),
            RetryPolicy::rate_limit(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_single_rate_limit_retries_once() {
        let limiter = fast_limiter();
        let calls = Arc::new(AtomicUsize::new(0));

        let started = std::time::Instant::now();
        let counter = calls.clone();
        let result = limiter
            .execute("AAPL", || {
                let counter = counter.clone();
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(SourceError::RateLimited("test".to_string())),
                        _ => Ok(42),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Cool-down was honoured before the retry
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_two_rate_limits_skip_item() {
        let limiter = fast_limiter();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = limiter
            .execute("MSFT", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::RateLimited("test".to_string()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_not_retried() {
        let limiter = fast_limiter();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = limiter
            .execute("GOOG", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Http {
                        status: 500,
                        url: "http://example".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(SourceError::Http { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_min_interval_between_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(30), RetryPolicy::none());

        let started = std::time::Instant::now();
        for _ in 0..3 {
            limiter.execute("tick", || async { Ok::<_, SourceError>(()) }).await.unwrap();
        }

        // First request is immediate, the next two each wait one interval
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.cool_down, Duration::from_secs(60));
        assert!((policy.retryable)(&SourceError::RateLimited("x".to_string())));
        assert!(!(policy.retryable)(&SourceError::Transport("x".to_string())));

        assert_eq!(RetryPolicy::new(0, Duration::ZERO, |_| true).max_attempts, 1);
    }
}
