//! Fixed-window rate limiting state.
//!
//! Each caller identifier maps to at most one [`RateWindow`]. The window is
//! a counter plus an absolute roll-over instant; a window whose `reset_at`
//! has passed is expired and must be replaced, never incremented, so no
//! count or cap carries across a window boundary.
//!
//! The assessment here is pure: it takes the stored window and the current
//! time and returns what the limiter should do. Persistence (and the
//! read-modify-write race that comes with it) lives behind the
//! `RateLimitBackend` port.

use serde::{Deserialize, Serialize};

/// One caller's counter for the current fixed window.
///
/// Serialized as `{"count": …, "resetAt": …}` with `reset_at` in epoch
/// milliseconds; this is the persisted shape on both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindow {
    /// Requests observed in this window, always >= 1.
    pub count: u32,
    /// Instant (epoch ms) after which the window rolls over.
    pub reset_at: i64,
}

impl RateWindow {
    /// Open a fresh window for a first request.
    pub fn open(now_ms: i64, window_seconds: u64) -> Self {
        Self {
            count: 1,
            reset_at: now_ms.saturating_add(window_seconds as i64 * 1000),
        }
    }

    /// Whether the window has rolled over at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at
    }

    /// Whole seconds until roll-over, rounded up. Zero once expired.
    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        let remaining_ms = self.reset_at.saturating_sub(now_ms);
        if remaining_ms <= 0 {
            0
        } else {
            ((remaining_ms + 999) / 1000) as u64
        }
    }
}

/// What the limiter should do with the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// No live window: persist this fresh one (count = 1) and allow.
    Start(RateWindow),
    /// Live window under quota: persist the incremented window and allow.
    Increment(RateWindow),
    /// Quota reached: deny without writing.
    Deny {
        /// Seconds until the window rolls over, rounded up.
        retry_after_seconds: u64,
    },
}

/// Assess one request against the stored window.
///
/// An absent or expired window always yields [`WindowVerdict::Start`]: the
/// previous window's count is discarded wholesale, it is never merged into
/// the new one.
pub fn assess(
    current: Option<RateWindow>,
    now_ms: i64,
    max_requests: u32,
    window_seconds: u64,
) -> WindowVerdict {
    match current {
        Some(window) if !window.is_expired(now_ms) => {
            if window.count >= max_requests {
                WindowVerdict::Deny {
                    retry_after_seconds: window.remaining_seconds(now_ms),
                }
            } else {
                WindowVerdict::Increment(RateWindow {
                    count: window.count + 1,
                    reset_at: window.reset_at,
                })
            }
        }
        _ => WindowVerdict::Start(RateWindow::open(now_ms, window_seconds)),
    }
}
