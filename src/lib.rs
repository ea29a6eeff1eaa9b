//! # formsink
//!
//! Form-submission intake core: dual-backend persistence and fixed-window
//! rate limiting.
//!
//! This crate is the storage heart of a form intake service. It accepts a
//! payload that has already passed transport-level parsing, runs it through
//! an anti-abuse verdict and a per-caller quota, persists it, and serves
//! later retrieval by form or by id. HTTP routing, CORS, and the concrete
//! verifier and notifier integrations live outside; their seams are the
//! [`Verifier`] and [`Notifier`] ports.
//!
//! ## Backends
//!
//! State lives in one or two interchangeable external backends:
//!
//! - the **log backend** ([`RedisBackend`]): a key/value store with native
//!   expiry, a bounded per-form index, and no query language. Reads may lag
//!   writes across callers.
//! - the **table backend** ([`SqliteBackend`]): a relational table with real
//!   predicates, descending-timestamp ordering, atomic column updates, and
//!   immediate read-after-write consistency.
//!
//! Selection happens once, at construction: submissions prefer the table
//! backend, rate limiting prefers the log backend, and each degrades as
//! documented when nothing is configured. In particular the limiter **fails
//! open** - absence of a rate-limit store, or an error talking to it, never
//! blocks legitimate traffic.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formsink::{
//!     format_timestamp, BackendConfig, Backends, Clock, Metrics, RandomId, RateLimiter,
//!     SubmissionMeta, SubmissionStore, SystemClock,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backends = Backends::connect(&BackendConfig::from_env()).await?;
//!     let metrics = Metrics::new();
//!     let clock = Arc::new(SystemClock::new());
//!
//!     let store = SubmissionStore::new(
//!         backends.submission_backend(),
//!         Arc::new(RandomId::new()),
//!         metrics.clone(),
//!     );
//!     let limiter = RateLimiter::new(backends.rate_limit_backend(), clock.clone(), metrics);
//!
//!     let decision = limiter.check("203.0.113.7", 10, 60).await;
//!     if decision.allowed {
//!         let metadata = SubmissionMeta {
//!             ip: "203.0.113.7".to_string(),
//!             user_agent: "curl/8.0".to_string(),
//!             timestamp: format_timestamp(clock.now_ms()),
//!             spam_score: None,
//!         };
//!         let id = store.store("contact", serde_json::Map::new(), metadata).await?;
//!         println!("stored {id}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Known Limitations
//!
//! - The rate limiter is **best-effort, not exact**: the read-decide-write
//!   sequence is not atomic on the log backend, and the table backend's
//!   fresh-window branch has an insert race. Concurrent checks for one
//!   identifier can undercount. Acceptable for abuse mitigation, not for
//!   billing-grade metering.
//! - `get_by_id` on the log backend scans the whole submission keyspace,
//!   because records are keyed by form and a bare id does not name one.
//!   Use the table backend when point lookups matter.
//! - The log backend's reads may not observe a write immediately from
//!   other callers.

// Domain layer - pure types and logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    submission::{format_timestamp, Submission, SubmissionMeta},
    window::{RateWindow, WindowVerdict},
};

pub use application::{
    intake::{IntakeLimits, IntakeOutcome, IntakePipeline, IntakeRequest},
    limiter::{RateDecision, RateLimiter},
    metrics::{Metrics, MetricsSnapshot},
    ports::{
        Clock, IdGenerator, Notifier, RateLimitBackend, StorageError, SubmissionBackend, Verdict,
        Verifier,
    },
    store::SubmissionStore,
};

pub use infrastructure::{
    clock::SystemClock,
    config::{BackendConfig, Backends},
    id::RandomId,
    redis_backend::{RedisBackend, MAX_INDEX_ENTRIES},
    sqlite_backend::SqliteBackend,
};

#[cfg(feature = "test-helpers")]
pub use infrastructure::mocks::{MemoryBackend, MockClock};
