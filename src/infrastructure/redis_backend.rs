//! Redis-backed log storage.
//!
//! The log backend is an ordered append log over plain keys:
//!
//! - `submission:{formId}:{id}` → JSON submission record
//! - `index:{formId}` → JSON array of ids, newest first, at most
//!   [`MAX_INDEX_ENTRIES`] entries
//! - `ratelimit:{identifier}` → JSON `{count, resetAt}` with a native TTL
//!   equal to the remaining window length
//!
//! ## Limitations
//!
//! - Read-after-write consistency across readers is not guaranteed: a list
//!   or point lookup issued right after a store from a different caller may
//!   not observe the new submission yet.
//! - `get_by_id` has no direct key to the record (the keyspace is
//!   partitioned by form, which a bare id does not reveal), so it SCANs
//!   every submission key and matches the id suffix. O(total submissions);
//!   use the table backend when point lookups are frequent.
//! - The index update and the rate-window increment are read-modify-write
//!   sequences with no atomicity across the round trips; concurrent writers
//!   can interleave. Accepted best-effort behavior.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::application::ports::{RateLimitBackend, StorageError, SubmissionBackend};
use crate::domain::submission::Submission;
use crate::domain::window::RateWindow;

/// Upper bound on ids retained per form index; oldest entries fall off.
pub const MAX_INDEX_ENTRIES: usize = 1000;

const BACKEND: &str = "redis";

fn submission_key(form_id: &str, id: &str) -> String {
    format!("submission:{form_id}:{id}")
}

fn index_key(form_id: &str) -> String {
    format!("index:{form_id}")
}

fn rate_limit_key(identifier: &str) -> String {
    format!("ratelimit:{identifier}")
}

fn io(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> StorageError {
    StorageError::backend(BACKEND, source)
}

/// Prepend an id to a form index, keeping the bound.
fn prepend_bounded(ids: &mut Vec<String>, id: String) {
    ids.insert(0, id);
    ids.truncate(MAX_INDEX_ENTRIES);
}

/// Log backend over Redis.
///
/// Cheap to clone: the connection manager multiplexes one connection and
/// reconnects on failure.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1/")
    ///
    /// # Errors
    /// Returns [`StorageError::Backend`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = Client::open(url).map_err(io)?;
        let connection = ConnectionManager::new(client).await.map_err(io)?;
        Ok(Self { connection })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl SubmissionBackend for RedisBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, submission: &Submission) -> Result<(), StorageError> {
        let mut conn = self.conn();

        let payload = serde_json::to_string(submission).map_err(io)?;
        let record_key = submission_key(&submission.form_id, &submission.id);
        conn.set::<_, _, ()>(&record_key, payload).await.map_err(io)?;

        // Read-prepend-truncate-write; concurrent inserts to the same form
        // can interleave here, and the index reflects completion order.
        let index_key = index_key(&submission.form_id);
        let raw: Option<String> = conn.get(&index_key).await.map_err(io)?;
        // A corrupt index is treated as absent and rebuilt from this insert on
        let mut ids: Vec<String> = raw
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        prepend_bounded(&mut ids, submission.id.clone());
        let encoded = serde_json::to_string(&ids).map_err(io)?;
        conn.set::<_, _, ()>(&index_key, encoded).await.map_err(io)?;

        Ok(())
    }

    async fn list_by_form(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StorageError> {
        let mut conn = self.conn();

        let raw: Option<String> = conn.get(index_key(form_id)).await.map_err(io)?;
        let ids: Vec<String> = raw
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        // One fetch per id; this backend has no multi-key query
        let mut submissions = Vec::new();
        for id in ids.iter().skip(offset).take(limit) {
            let payload: Option<String> = conn
                .get(submission_key(form_id, id))
                .await
                .map_err(io)?;
            // An indexed id whose record is gone (lagging or expired) is skipped
            if let Some(payload) = payload {
                submissions.push(serde_json::from_str(&payload).map_err(io)?);
            }
        }
        Ok(submissions)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        let mut conn = self.conn();
        let suffix = format!(":{id}");
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("submission:*")
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(io)?;

            for key in keys {
                if key.ends_with(&suffix) {
                    let payload: Option<String> = conn.get(&key).await.map_err(io)?;
                    if let Some(payload) = payload {
                        return serde_json::from_str(&payload).map(Some).map_err(io);
                    }
                }
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(None)
    }
}

#[async_trait]
impl RateLimitBackend for RedisBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn load(&self, key: &str) -> Result<Option<RateWindow>, StorageError> {
        let mut conn = self.conn();
        let redis_key = rate_limit_key(key);
        let raw: Option<String> = conn.get(&redis_key).await.map_err(io)?;

        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(window) => Ok(Some(window)),
                Err(_) => {
                    // Corrupted window: drop it so the caller starts fresh
                    let _: () = conn.del(&redis_key).await.map_err(io)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn replace(
        &self,
        key: &str,
        window: RateWindow,
        ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let payload = serde_json::to_string(&window).map_err(io)?;
        conn.set_ex::<_, _, ()>(rate_limit_key(key), payload, ttl_seconds)
            .await
            .map_err(io)
    }

    async fn increment(
        &self,
        key: &str,
        window: RateWindow,
        ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        // Whole-window rewrite: no atomic increment is assumed of this
        // backend, so concurrent checks can both persist the same count.
        // The TTL shrinks to the remaining window length.
        let mut conn = self.conn();
        let payload = serde_json::to_string(&window).map_err(io)?;
        conn.set_ex::<_, _, ()>(rate_limit_key(key), payload, ttl_seconds)
            .await
            .map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(submission_key("f1", "abc"), "submission:f1:abc");
        assert_eq!(index_key("f1"), "index:f1");
        assert_eq!(rate_limit_key("10.0.0.1"), "ratelimit:10.0.0.1");
    }

    #[test]
    fn test_prepend_bounded_keeps_newest_first() {
        let mut ids = vec!["b".to_string(), "a".to_string()];
        prepend_bounded(&mut ids, "c".to_string());
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_prepend_bounded_evicts_oldest() {
        let mut ids: Vec<String> = (0..MAX_INDEX_ENTRIES).map(|i| i.to_string()).collect();
        prepend_bounded(&mut ids, "new".to_string());
        assert_eq!(ids.len(), MAX_INDEX_ENTRIES);
        assert_eq!(ids[0], "new");
        // The oldest entry fell off the tail
        assert_eq!(ids[MAX_INDEX_ENTRIES - 1], (MAX_INDEX_ENTRIES - 2).to_string());
    }
}
