//! Submission persistence coordination.
//!
//! The store is a thin coordinator over the configured backend: it assigns
//! the identifier, delegates persistence, and pins down the behavior when
//! no backend is configured at all. Backend selection happens once, at
//! construction, never per call.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::application::metrics::Metrics;
use crate::application::ports::{IdGenerator, StorageError, SubmissionBackend};
use crate::domain::submission::{Submission, SubmissionMeta};

/// Persists and retrieves submissions against the selected backend.
///
/// When constructed without a backend, `store` fails with
/// [`StorageError::Unavailable`] while both read operations return empty
/// results (`Ok(vec![])` / `Ok(None)`); with a backend configured, read
/// failures propagate as [`StorageError::Backend`] and are never silently
/// mapped to empty results.
#[derive(Debug, Clone)]
pub struct SubmissionStore {
    backend: Option<Arc<dyn SubmissionBackend>>,
    ids: Arc<dyn IdGenerator>,
    metrics: Metrics,
}

impl SubmissionStore {
    /// Create a store over the selected backend.
    ///
    /// # Arguments
    /// * `backend` - The backend chosen at startup, or `None` when no
    ///   storage is configured
    /// * `ids` - Identifier source for new submissions
    /// * `metrics` - Shared metrics tracker
    pub fn new(
        backend: Option<Arc<dyn SubmissionBackend>>,
        ids: Arc<dyn IdGenerator>,
        metrics: Metrics,
    ) -> Self {
        Self {
            backend,
            ids,
            metrics,
        }
    }

    /// Persist a new submission and return its assigned identifier.
    ///
    /// # Errors
    /// [`StorageError::Unavailable`] when no backend is configured;
    /// [`StorageError::Backend`] when the backend write fails. Write
    /// failures are never swallowed: a returned id means the backend
    /// accepted the record.
    pub async fn store(
        &self,
        form_id: &str,
        data: Map<String, Value>,
        metadata: SubmissionMeta,
    ) -> Result<String, StorageError> {
        let Some(backend) = &self.backend else {
            self.metrics.record_store_failure();
            return Err(StorageError::Unavailable);
        };

        let submission = Submission {
            id: self.ids.next(),
            form_id: form_id.to_owned(),
            data,
            metadata,
        };

        match backend.insert(&submission).await {
            Ok(()) => {
                debug!(
                    backend = backend.name(),
                    id = %submission.id,
                    form_id,
                    "submission stored"
                );
                self.metrics.record_stored();
                Ok(submission.id)
            }
            Err(e) => {
                self.metrics.record_store_failure();
                Err(e)
            }
        }
    }

    /// Fetch submissions for a form, newest first.
    ///
    /// Returns at most `limit` entries starting at `offset`. On the log
    /// backend a read issued immediately after a store from a different
    /// caller may not observe the new submission yet.
    pub async fn list_by_form(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(Vec::new());
        };
        backend.list_by_form(form_id, limit, offset).await
    }

    /// Point lookup by bare id.
    ///
    /// `Ok(None)` is a valid miss. On the log backend this is an O(total
    /// submissions) scan; prefer the table backend when point lookups are
    /// frequent.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        backend.get_by_id(id).await
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
