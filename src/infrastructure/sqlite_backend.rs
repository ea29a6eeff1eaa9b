//! SQLite-backed table storage.
//!
//! The table backend is a relational store with real query support and
//! immediate read-after-write consistency:
//!
//! - `submissions(id, form_id, data, metadata, created_at)` with indexes on
//!   `form_id`, `created_at DESC` and `(form_id, created_at DESC)`
//! - `rate_limits(key, count, reset_at)` with `reset_at` in epoch ms
//!
//! `data` and `metadata` are stored as JSON text; `created_at` duplicates
//! `metadata.timestamp` as the sort and index column.
//!
//! ## Concurrency
//!
//! `rusqlite` is synchronous, so every call runs on the blocking thread
//! pool via `tokio::task::spawn_blocking` with connection access serialized
//! through a mutex. The rate-window increment is an atomic
//! `count = count + 1` column update, which is safe under concurrent
//! writers; window replacement is delete-then-insert and can race between
//! the two statements when separate processes share the database file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::application::ports::{RateLimitBackend, StorageError, SubmissionBackend};
use crate::domain::submission::Submission;
use crate::domain::window::RateWindow;

const BACKEND: &str = "sqlite";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    form_id TEXT,
    data TEXT,
    metadata TEXT,
    created_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_submissions_form_id ON submissions(form_id);
CREATE INDEX IF NOT EXISTS idx_submissions_created_at ON submissions(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_submissions_form_created ON submissions(form_id, created_at DESC);
CREATE TABLE IF NOT EXISTS rate_limits (
    key TEXT PRIMARY KEY,
    count INTEGER,
    reset_at INTEGER
);
";

fn io(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> StorageError {
    StorageError::backend(BACKEND, source)
}

fn row_to_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Submission> {
    let id: String = row.get(0)?;
    let form_id: String = row.get(1)?;
    let data: String = row.get(2)?;
    let metadata: String = row.get(3)?;

    let data = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let metadata = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Submission {
        id,
        form_id,
        data,
        metadata,
    })
}

/// Table backend over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and ensure the schema.
    ///
    /// # Errors
    /// Returns [`StorageError::Backend`] if the database cannot be opened
    /// or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path).map_err(io)?)
    }

    /// Open a private in-memory database. Intended for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory().map_err(io)?)
    }

    fn from_connection(connection: Connection) -> Result<Self, StorageError> {
        connection.execute_batch(SCHEMA).map_err(io)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection
                .lock()
                .map_err(|_| io("connection mutex poisoned"))?;
            f(&guard).map_err(io)
        })
        .await
        .map_err(io)?
    }
}

#[async_trait]
impl SubmissionBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, submission: &Submission) -> Result<(), StorageError> {
        let id = submission.id.clone();
        let form_id = submission.form_id.clone();
        let created_at = submission.metadata.timestamp.clone();
        let data = serde_json::to_string(&submission.data).map_err(io)?;
        let metadata = serde_json::to_string(&submission.metadata).map_err(io)?;

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO submissions (id, form_id, data, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, form_id, data, metadata, created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_by_form(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StorageError> {
        let form_id = form_id.to_owned();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, form_id, data, metadata FROM submissions \
                 WHERE form_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(
                params![form_id, limit as i64, offset as i64],
                row_to_submission,
            )?;
            rows.collect()
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        let id = id.to_owned();
        self.with_connection(move |conn| {
            conn.query_row(
                "SELECT id, form_id, data, metadata FROM submissions WHERE id = ?1",
                params![id],
                row_to_submission,
            )
            .optional()
        })
        .await
    }
}

#[async_trait]
impl RateLimitBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn load(&self, key: &str) -> Result<Option<RateWindow>, StorageError> {
        let key = key.to_owned();
        self.with_connection(move |conn| {
            conn.query_row(
                "SELECT count, reset_at FROM rate_limits WHERE key = ?1",
                params![key],
                |row| {
                    Ok(RateWindow {
                        count: row.get(0)?,
                        reset_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn replace(
        &self,
        key: &str,
        window: RateWindow,
        _ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        // Delete-then-insert rather than upsert. Expired rows have no TTL
        // here; they sit until overwritten by the next window.
        let key = key.to_owned();
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM rate_limits WHERE key = ?1", params![key])?;
            conn.execute(
                "INSERT INTO rate_limits (key, count, reset_at) VALUES (?1, ?2, ?3)",
                params![key, window.count, window.reset_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn increment(
        &self,
        key: &str,
        _window: RateWindow,
        _ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        // Atomic column update scoped to the key; the one place the design
        // relies on backend-level atomicity instead of coordination.
        let key = key.to_owned();
        self.with_connection(move |conn| {
            conn.execute(
                "UPDATE rate_limits SET count = count + 1 WHERE key = ?1",
                params![key],
            )?;
            Ok(())
        })
        .await
    }
}
