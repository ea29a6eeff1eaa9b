//! Backend configuration and connection.
//!
//! Configuration is an explicit struct handed to [`Backends::connect`];
//! there are no process-wide singletons, and backend selection happens once
//! at startup rather than per call. Either backend, both, or neither may be
//! configured: the store and the limiter each degrade as documented when
//! their selection comes up empty.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::application::ports::{RateLimitBackend, StorageError, SubmissionBackend};
use crate::infrastructure::redis_backend::RedisBackend;
use crate::infrastructure::sqlite_backend::SqliteBackend;

/// Where the two optional backends live.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Redis connection URL for the log backend.
    pub redis_url: Option<String>,
    /// SQLite database path for the table backend.
    pub sqlite_path: Option<PathBuf>,
}

impl BackendConfig {
    /// Load from `FORMSINK_REDIS_URL` and `FORMSINK_SQLITE_PATH`.
    ///
    /// Unset or empty variables simply disable the backend; that is a
    /// supported configuration, not an error.
    pub fn from_env() -> Self {
        Self {
            redis_url: optional_var("FORMSINK_REDIS_URL"),
            sqlite_path: optional_var("FORMSINK_SQLITE_PATH").map(PathBuf::from),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            info!("{key} not set, backend disabled");
            None
        }
    }
}

/// Connected backend handles, created once at startup.
#[derive(Debug, Clone)]
pub struct Backends {
    log: Option<Arc<RedisBackend>>,
    table: Option<Arc<SqliteBackend>>,
}

impl Backends {
    /// Connect whatever the configuration names.
    ///
    /// # Errors
    /// Returns [`StorageError::Backend`] if a configured backend cannot be
    /// reached or initialized. A backend that is not configured is skipped,
    /// not an error.
    pub async fn connect(config: &BackendConfig) -> Result<Self, StorageError> {
        let log = match &config.redis_url {
            Some(url) => {
                let backend = RedisBackend::connect(url).await?;
                info!("log backend connected");
                Some(Arc::new(backend))
            }
            None => None,
        };

        let table = match &config.sqlite_path {
            Some(path) => {
                let backend = SqliteBackend::open(path)?;
                info!(path = %path.display(), "table backend opened");
                Some(Arc::new(backend))
            }
            None => None,
        };

        Ok(Self { log, table })
    }

    /// Build from already-connected handles.
    pub fn new(log: Option<Arc<RedisBackend>>, table: Option<Arc<SqliteBackend>>) -> Self {
        Self { log, table }
    }

    /// Backend selection for submission persistence.
    ///
    /// The table backend wins when configured (real query support, no
    /// consistency lag); otherwise the log backend; otherwise none.
    pub fn submission_backend(&self) -> Option<Arc<dyn SubmissionBackend>> {
        match (&self.table, &self.log) {
            (Some(table), _) => Some(Arc::clone(table) as Arc<dyn SubmissionBackend>),
            (None, Some(log)) => Some(Arc::clone(log) as Arc<dyn SubmissionBackend>),
            (None, None) => None,
        }
    }

    /// Backend selection for rate limiting.
    ///
    /// The log backend wins when configured (cheaper counter round trips);
    /// otherwise the table backend; otherwise none, which makes the limiter
    /// fail open.
    pub fn rate_limit_backend(&self) -> Option<Arc<dyn RateLimitBackend>> {
        match (&self.log, &self.table) {
            (Some(log), _) => Some(Arc::clone(log) as Arc<dyn RateLimitBackend>),
            (None, Some(table)) => Some(Arc::clone(table) as Arc<dyn RateLimitBackend>),
            (None, None) => None,
        }
    }
}
