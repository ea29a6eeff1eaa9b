//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the
//! application layer needs. Infrastructure adapters implement these ports:
//! the two storage backends, the system clock, the identifier source, and
//! the two intake collaborators (verifier and notifier).

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::submission::Submission;
use crate::domain::window::RateWindow;

/// Error raised by storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// No storage backend is configured.
    Unavailable,
    /// A backend I/O operation failed.
    Backend {
        /// Which backend failed ("redis", "sqlite", ...).
        backend: &'static str,
        /// Underlying cause.
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure with the backend's name.
    pub fn backend(backend: &'static str, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        StorageError::Backend {
            backend,
            source: source.into(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable => {
                write!(f, "no storage backend is configured")
            }
            StorageError::Backend { backend, source } => {
                write!(f, "{} backend error: {}", backend, source)
            }
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Unavailable => None,
            StorageError::Backend { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Port for obtaining current wall-clock time.
///
/// Rate windows and submission timestamps are persisted absolutes, so this
/// clock reports unix milliseconds rather than a monotonic instant.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Current time as milliseconds since the unix epoch.
    fn now_ms(&self) -> i64;
}

/// Port for producing submission identifiers.
///
/// Identifiers are short, URL-safe, collision-resistant random strings with
/// no ordering guarantee and no timing or counter information. Stateless.
pub trait IdGenerator: Send + Sync + Debug {
    /// Produce the next identifier.
    fn next(&self) -> String;
}

/// Port for submission persistence.
///
/// Implemented by the log backend (ordered append log with a bounded
/// per-form index) and the table backend (relational table with real query
/// support). The backend-specific semantics, including the log backend's
/// weaker read-after-write consistency and its O(total) bare-id lookup,
/// are documented on the adapters.
#[async_trait]
pub trait SubmissionBackend: Send + Sync + Debug {
    /// Stable name used in error and log output.
    fn name(&self) -> &'static str;

    /// Persist a new submission.
    async fn insert(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Fetch submissions for a form, newest first.
    async fn list_by_form(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StorageError>;

    /// Point lookup by bare id. `None` is a valid miss, not an error.
    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, StorageError>;
}

/// Port for rate-limit window persistence.
///
/// The surface encodes the per-backend write semantics the limiter relies
/// on: `replace` installs a fresh window discarding any previous one, and
/// `increment` persists one more request in a live window (an atomic column
/// update on the table backend, a whole-window rewrite on the log backend).
#[async_trait]
pub trait RateLimitBackend: Send + Sync + Debug {
    /// Stable name used in error and log output.
    fn name(&self) -> &'static str;

    /// Load the current window for an identifier.
    async fn load(&self, key: &str) -> Result<Option<RateWindow>, StorageError>;

    /// Install a fresh window, discarding any previous one.
    async fn replace(
        &self,
        key: &str,
        window: RateWindow,
        ttl_seconds: u64,
    ) -> Result<(), StorageError>;

    /// Persist an increment of a live window.
    async fn increment(
        &self,
        key: &str,
        window: RateWindow,
        ttl_seconds: u64,
    ) -> Result<(), StorageError>;
}

/// Verdict returned by the anti-abuse verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether the token passed verification.
    pub accepted: bool,
    /// Verifier's spam confidence score, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Verifier error codes for a rejection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
}

/// Port for the anti-abuse verification collaborator.
///
/// The pipeline consumes only the verdict; how the implementation reaches
/// its backend, and what it does with transport failures, is its own
/// concern.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify a token for a caller address.
    async fn verify(&self, token: &str, remote_ip: &str) -> Verdict;
}

/// Port for the delivery collaborator.
///
/// Invoked detached after a submission is persisted; a failure here is
/// logged and never reaches the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempt delivery of a stored submission.
    async fn notify(&self, submission: &Submission) -> Result<(), Box<dyn Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let unavailable = StorageError::Unavailable;
        assert_eq!(unavailable.to_string(), "no storage backend is configured");

        let backend = StorageError::backend("redis", "connection refused");
        assert_eq!(backend.to_string(), "redis backend error: connection refused");
    }

    #[test]
    fn test_storage_error_source() {
        let backend = StorageError::backend("sqlite", "disk full");
        assert!(backend.source().is_some());
        assert!(StorageError::Unavailable.source().is_none());
    }

    #[test]
    fn test_verdict_deserializes_sparse_payload() {
        let verdict: Verdict = serde_json::from_str(r#"{"accepted":true}"#).unwrap();
        assert!(verdict.accepted);
        assert_eq!(verdict.confidence_score, None);
        assert!(verdict.error_codes.is_empty());

        let verdict: Verdict = serde_json::from_str(
            r#"{"accepted":false,"confidenceScore":0.9,"errorCodes":["timeout-or-duplicate"]}"#,
        )
        .unwrap();
        assert!(!verdict.accepted);
        assert_eq!(verdict.confidence_score, Some(0.9));
        assert_eq!(verdict.error_codes, vec!["timeout-or-duplicate"]);
    }
}
