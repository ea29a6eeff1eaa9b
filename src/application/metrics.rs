//! Observability counters for the intake core.
//!
//! Informational only: counters are updated with relaxed atomics and can be
//! read at any time for monitoring or tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking store and limiter activity.
///
/// Cheap to clone; all clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Submissions successfully persisted
    submissions_stored: AtomicU64,
    /// Submission store operations that failed
    store_failures: AtomicU64,
    /// Rate-limit checks that allowed the request
    checks_allowed: AtomicU64,
    /// Rate-limit checks that denied the request
    checks_denied: AtomicU64,
    /// Checks allowed because no backend was configured or a backend failed
    limiter_fail_opens: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                submissions_stored: AtomicU64::new(0),
                store_failures: AtomicU64::new(0),
                checks_allowed: AtomicU64::new(0),
                checks_denied: AtomicU64::new(0),
                limiter_fail_opens: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_stored(&self) {
        self.inner.submissions_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_failure(&self) {
        self.inner.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allowed(&self) {
        self.inner.checks_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.inner.checks_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fail_open(&self) {
        self.inner.limiter_fail_opens.fetch_add(1, Ordering::Relaxed);
        // A fail-open is still an allowed check
        self.inner.checks_allowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total submissions successfully persisted.
    pub fn submissions_stored(&self) -> u64 {
        self.inner.submissions_stored.load(Ordering::Relaxed)
    }

    /// Total submission store failures.
    pub fn store_failures(&self) -> u64 {
        self.inner.store_failures.load(Ordering::Relaxed)
    }

    /// Total rate-limit checks that allowed the request.
    pub fn checks_allowed(&self) -> u64 {
        self.inner.checks_allowed.load(Ordering::Relaxed)
    }

    /// Total rate-limit checks that denied the request.
    pub fn checks_denied(&self) -> u64 {
        self.inner.checks_denied.load(Ordering::Relaxed)
    }

    /// Total checks allowed without consulting a working backend.
    pub fn limiter_fail_opens(&self) -> u64 {
        self.inner.limiter_fail_opens.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions_stored: self.submissions_stored(),
            store_failures: self.store_failures(),
            checks_allowed: self.checks_allowed(),
            checks_denied: self.checks_denied(),
            limiter_fail_opens: self.limiter_fail_opens(),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.submissions_stored.store(0, Ordering::Relaxed);
        self.inner.store_failures.store(0, Ordering::Relaxed);
        self.inner.checks_allowed.store(0, Ordering::Relaxed);
        self.inner.checks_denied.store(0, Ordering::Relaxed);
        self.inner.limiter_fail_opens.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Submissions successfully persisted
    pub submissions_stored: u64,
    /// Submission store operations that failed
    pub store_failures: u64,
    /// Rate-limit checks that allowed the request
    pub checks_allowed: u64,
    /// Rate-limit checks that denied the request
    pub checks_denied: u64,
    /// Checks allowed without consulting a working backend
    pub limiter_fail_opens: u64,
}

impl MetricsSnapshot {
    /// Ratio of denied checks to total checks, 0.0 when none were made.
    pub fn denial_rate(&self) -> f64 {
        let total = self.checks_allowed.saturating_add(self.checks_denied);
        if total == 0 {
            0.0
        } else {
            self.checks_denied as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_stored();
        metrics.record_stored();
        metrics.record_allowed();
        metrics.record_denied();
        metrics.record_fail_open();

        assert_eq!(metrics.submissions_stored(), 2);
        assert_eq!(metrics.checks_denied(), 1);
        // fail-open counts as allowed too
        assert_eq!(metrics.checks_allowed(), 2);
        assert_eq!(metrics.limiter_fail_opens(), 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let clone = metrics.clone();
        clone.record_store_failure();
        assert_eq!(metrics.store_failures(), 1);
    }

    #[test]
    fn test_denial_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().denial_rate(), 0.0);

        metrics.record_allowed();
        metrics.record_allowed();
        metrics.record_allowed();
        metrics.record_denied();
        assert!((metrics.snapshot().denial_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_stored();
        metrics.record_denied();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot {
            submissions_stored: 0,
            store_failures: 0,
            checks_allowed: 0,
            checks_denied: 0,
            limiter_fail_opens: 0,
        });
    }
}
