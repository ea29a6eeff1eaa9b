//! Submission records.
//!
//! A submission is immutable after creation: the store exposes create and
//! read operations only, never update or delete. The serialized form uses
//! camelCase field names and is the persisted wire format on both backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::macros::format_description;
use time::OffsetDateTime;

/// Request metadata captured alongside a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMeta {
    /// Caller network address.
    pub ip: String,
    /// Caller user agent string.
    pub user_agent: String,
    /// Creation instant, RFC 3339 with a fixed three-digit fraction.
    /// Doubles as the table backend's sort column.
    pub timestamp: String,
    /// Verifier confidence score, when one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spam_score: Option<f64>,
}

/// A stored form submission.
///
/// `data` is opaque to the store: field values are persisted and returned
/// verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Opaque unique identifier, assigned once at creation.
    pub id: String,
    /// Caller-supplied logical form identifier; the partition key.
    pub form_id: String,
    /// Field name to value mapping.
    pub data: Map<String, Value>,
    /// Request metadata.
    pub metadata: SubmissionMeta,
}

/// Formats an epoch-millisecond instant as an RFC 3339 timestamp.
///
/// The fraction is always three digits so that lexicographic order of the
/// strings matches chronological order, which the table backend's
/// `created_at` sort relies on.
pub fn format_timestamp(epoch_ms: i64) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(epoch_ms) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&format).ok())
        .unwrap_or_default()
}
