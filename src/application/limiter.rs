//! Fixed-window rate limiter.
//!
//! The limiter loads the caller's window, asks the pure domain assessment
//! what to do, and persists the outcome. It is best-effort by design: the
//! read-decide-write sequence is not atomic, so concurrent checks for the
//! same identifier can both observe a stale count and both succeed. That
//! undercounting is acceptable for abuse mitigation and is not corrected
//! with locks or transactions.
//!
//! ## Fail-open
//!
//! Availability is prioritized over strict quota enforcement: a missing
//! backend or any backend error during a check results in the request
//! being allowed. Limiter failures never propagate to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, RateLimitBackend};
use crate::domain::window::{self, WindowVerdict};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Seconds until the window rolls over, set only on a denial.
    pub retry_after_seconds: Option<u64>,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: None,
        }
    }

    fn deny(retry_after_seconds: u64) -> Self {
        Self {
            allowed: false,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }
}

/// Enforces a fixed-window request quota per caller identifier.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    backend: Option<Arc<dyn RateLimitBackend>>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl RateLimiter {
    /// Create a limiter over the selected backend.
    ///
    /// # Arguments
    /// * `backend` - The backend chosen at startup, or `None` to run
    ///   fail-open
    /// * `clock` - Wall-clock source for window boundaries
    /// * `metrics` - Shared metrics tracker
    pub fn new(
        backend: Option<Arc<dyn RateLimitBackend>>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            backend,
            clock,
            metrics,
        }
    }

    /// Check one request against the identifier's quota.
    ///
    /// Fixed window, not sliding: an expired window is replaced with a
    /// fresh one at `count = 1`, discarding whatever the previous window
    /// had accumulated. A denial performs no write.
    pub async fn check(
        &self,
        identifier: &str,
        max_requests: u32,
        window_seconds: u64,
    ) -> RateDecision {
        let Some(backend) = &self.backend else {
            debug!(identifier, "no rate-limit backend configured, allowing");
            self.metrics.record_fail_open();
            return RateDecision::allow();
        };

        let now_ms = self.clock.now_ms();

        let current = match backend.load(identifier).await {
            Ok(current) => current,
            Err(e) => {
                warn!(
                    error = %e,
                    backend = backend.name(),
                    identifier,
                    "rate-limit window load failed, allowing"
                );
                self.metrics.record_fail_open();
                return RateDecision::allow();
            }
        };

        match window::assess(current, now_ms, max_requests, window_seconds) {
            WindowVerdict::Start(fresh) => {
                if let Err(e) = backend.replace(identifier, fresh, window_seconds).await {
                    warn!(
                        error = %e,
                        backend = backend.name(),
                        identifier,
                        "rate-limit window replace failed, allowing"
                    );
                    self.metrics.record_fail_open();
                    return RateDecision::allow();
                }
                self.metrics.record_allowed();
                RateDecision::allow()
            }
            WindowVerdict::Increment(updated) => {
                let ttl_seconds = updated.remaining_seconds(now_ms);
                if let Err(e) = backend.increment(identifier, updated, ttl_seconds).await {
                    warn!(
                        error = %e,
                        backend = backend.name(),
                        identifier,
                        "rate-limit window increment failed, allowing"
                    );
                    self.metrics.record_fail_open();
                    return RateDecision::allow();
                }
                self.metrics.record_allowed();
                RateDecision::allow()
            }
            WindowVerdict::Deny {
                retry_after_seconds,
            } => {
                self.metrics.record_denied();
                RateDecision::deny(retry_after_seconds)
            }
        }
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{MemoryBackend, MockClock};
    use std::time::Duration;

    fn limiter_over(backend: Arc<MemoryBackend>, clock: Arc<MockClock>) -> RateLimiter {
        RateLimiter::new(Some(backend), clock, Metrics::new())
    }

    #[tokio::test]
    async fn test_quota_enforced_then_denied_with_retry() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(1_000));
        let limiter = limiter_over(Arc::clone(&backend), clock);

        for _ in 0..10 {
            let decision = limiter.check("ip1", 10, 60).await;
            assert!(decision.allowed);
            assert_eq!(decision.retry_after_seconds, None);
        }

        let denied = limiter.check("ip1", 10, 60).await;
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_seconds, Some(60));
        assert_eq!(limiter.metrics().checks_denied(), 1);
    }

    #[tokio::test]
    async fn test_single_request_quota() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(backend, clock);

        assert!(limiter.check("ip1", 1, 60).await.allowed);
        let denied = limiter.check("ip1", 1, 60).await;
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_seconds, Some(60));
    }

    #[tokio::test]
    async fn test_denial_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(Arc::clone(&backend), clock);

        limiter.check("ip1", 1, 60).await;
        let writes_before = backend.window_writes();
        let denied = limiter.check("ip1", 1, 60).await;
        assert!(!denied.allowed);
        assert_eq!(backend.window_writes(), writes_before);
    }

    #[tokio::test]
    async fn test_expired_window_restarts_at_one() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(Arc::clone(&backend), Arc::clone(&clock));

        // Exhaust the window
        assert!(limiter.check("ip1", 2, 60).await.allowed);
        assert!(limiter.check("ip1", 2, 60).await.allowed);
        assert!(!limiter.check("ip1", 2, 60).await.allowed);

        // Past the boundary the counter restarts regardless of the old count
        clock.advance(Duration::from_secs(61));
        assert!(limiter.check("ip1", 2, 60).await.allowed);
        let window = backend.window("ip1").await.unwrap();
        assert_eq!(window.count, 1);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(backend, clock);

        assert!(limiter.check("ip1", 1, 60).await.allowed);
        assert!(!limiter.check("ip1", 1, 60).await.allowed);
        assert!(limiter.check("ip2", 1, 60).await.allowed);
    }

    #[tokio::test]
    async fn test_no_backend_fails_open() {
        let clock = Arc::new(MockClock::new(0));
        let limiter = RateLimiter::new(None, clock, Metrics::new());

        for _ in 0..100 {
            assert!(limiter.check("ip1", 1, 60).await.allowed);
        }
        assert_eq!(limiter.metrics().limiter_fail_opens(), 100);
    }

    #[tokio::test]
    async fn test_backend_error_fails_open() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(Arc::clone(&backend), clock);

        // Exhaust the quota, then break the backend: the denial turns into
        // an allow because availability wins over enforcement
        assert!(limiter.check("ip1", 1, 60).await.allowed);
        assert!(!limiter.check("ip1", 1, 60).await.allowed);

        backend.set_failing(true);
        let decision = limiter.check("ip1", 1, 60).await;
        assert!(decision.allowed);
        assert_eq!(limiter.metrics().limiter_fail_opens(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_shrinks_as_window_ages() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let limiter = limiter_over(backend, Arc::clone(&clock));

        assert!(limiter.check("ip1", 1, 60).await.allowed);
        clock.advance(Duration::from_secs(45));
        let denied = limiter.check("ip1", 1, 60).await;
        assert_eq!(denied.retry_after_seconds, Some(15));

        // 44.5s in: 15.5s remaining rounds up to 16
        clock.set(44_500);
        let denied = limiter.check("ip1", 1, 60).await;
        assert_eq!(denied.retry_after_seconds, Some(16));
    }
}
