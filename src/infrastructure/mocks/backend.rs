//! In-memory backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::ports::{RateLimitBackend, StorageError, SubmissionBackend};
use crate::domain::submission::Submission;
use crate::domain::window::RateWindow;

/// In-memory implementation of both storage ports.
///
/// Keeps submissions in insertion order and rate windows in a map, and
/// supports failure injection so fail-open and error-propagation paths can
/// be exercised deterministically.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    submissions: Mutex<Vec<Submission>>,
    windows: Mutex<HashMap<String, RateWindow>>,
    failing: AtomicBool,
    window_writes: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful rate-window writes so far.
    pub fn window_writes(&self) -> u64 {
        self.window_writes.load(Ordering::SeqCst)
    }

    /// Number of stored submissions.
    pub async fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// Peek at an identifier's stored window.
    pub async fn window(&self, key: &str) -> Option<RateWindow> {
        self.windows.lock().unwrap().get(key).copied()
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::backend("memory", "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubmissionBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, submission: &Submission) -> Result<(), StorageError> {
        self.check_failure()?;
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }

    async fn list_by_form(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StorageError> {
        self.check_failure()?;
        let submissions = self.submissions.lock().unwrap();
        Ok(submissions
            .iter()
            .rev()
            .filter(|s| s.form_id == form_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        self.check_failure()?;
        let submissions = self.submissions.lock().unwrap();
        Ok(submissions.iter().find(|s| s.id == id).cloned())
    }
}

#[async_trait]
impl RateLimitBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<RateWindow>, StorageError> {
        self.check_failure()?;
        Ok(self.windows.lock().unwrap().get(key).copied())
    }

    async fn replace(
        &self,
        key: &str,
        window: RateWindow,
        _ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        self.check_failure()?;
        self.windows.lock().unwrap().insert(key.to_owned(), window);
        self.window_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        window: RateWindow,
        _ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        self.check_failure()?;
        self.windows.lock().unwrap().insert(key.to_owned(), window);
        self.window_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
