//! Intake pipeline: verify, rate-limit, persist, notify.
//!
//! Each incoming submission runs these steps strictly in order within its
//! own invocation; across invocations there is no ordering guarantee. The
//! notification step is detached: the pipeline returns as soon as the
//! submission is persisted, and a delivery failure is observable only in
//! the logs, never in the return value.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::application::limiter::RateLimiter;
use crate::application::ports::{Clock, Notifier, StorageError, Verifier};
use crate::application::store::SubmissionStore;
use crate::domain::submission::{format_timestamp, Submission, SubmissionMeta};

/// Quota applied per caller address.
#[derive(Debug, Clone, Copy)]
pub struct IntakeLimits {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_seconds: 60,
        }
    }
}

/// An incoming submission before verification.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    /// Logical form the payload belongs to.
    pub form_id: String,
    /// Field name to value mapping.
    pub data: Map<String, Value>,
    /// Anti-abuse token presented by the caller.
    pub token: String,
    /// Caller network address; also the rate-limit identifier.
    pub remote_ip: String,
    /// Caller user agent string.
    pub user_agent: String,
}

/// Terminal state of one intake invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Persisted; delivery proceeds in the background.
    Accepted {
        /// Assigned submission identifier.
        id: String,
    },
    /// The verifier rejected the token.
    Rejected {
        /// Verifier error codes, possibly empty.
        error_codes: Vec<String>,
    },
    /// The caller is over quota.
    RateLimited {
        /// Seconds until the window rolls over.
        retry_after_seconds: u64,
    },
}

/// Composes verifier, rate limiter, store and notifier for one submission.
pub struct IntakePipeline {
    verifier: Arc<dyn Verifier>,
    limiter: RateLimiter,
    store: SubmissionStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    limits: IntakeLimits,
}

impl IntakePipeline {
    /// Create a pipeline from its collaborators.
    pub fn new(
        verifier: Arc<dyn Verifier>,
        limiter: RateLimiter,
        store: SubmissionStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        limits: IntakeLimits,
    ) -> Self {
        Self {
            verifier,
            limiter,
            store,
            notifier,
            clock,
            limits,
        }
    }

    /// Run one submission through the pipeline.
    ///
    /// # Errors
    /// Only persistence failures surface as errors: the caller must know
    /// when a submission was not stored. Verification and quota misses are
    /// ordinary outcomes, and notification failures never propagate.
    pub async fn submit(&self, request: IntakeRequest) -> Result<IntakeOutcome, StorageError> {
        let verdict = self.verifier.verify(&request.token, &request.remote_ip).await;
        if !verdict.accepted {
            debug!(
                form_id = %request.form_id,
                error_codes = ?verdict.error_codes,
                "verification rejected submission"
            );
            return Ok(IntakeOutcome::Rejected {
                error_codes: verdict.error_codes,
            });
        }

        let decision = self
            .limiter
            .check(
                &request.remote_ip,
                self.limits.max_requests,
                self.limits.window_seconds,
            )
            .await;
        if !decision.allowed {
            return Ok(IntakeOutcome::RateLimited {
                retry_after_seconds: decision
                    .retry_after_seconds
                    .unwrap_or(self.limits.window_seconds),
            });
        }

        let metadata = SubmissionMeta {
            ip: request.remote_ip,
            user_agent: request.user_agent,
            timestamp: format_timestamp(self.clock.now_ms()),
            spam_score: verdict.confidence_score,
        };

        let data = request.data.clone();
        let id = self
            .store
            .store(&request.form_id, request.data, metadata.clone())
            .await?;

        let submission = Submission {
            id: id.clone(),
            form_id: request.form_id,
            data,
            metadata,
        };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&submission).await {
                warn!(
                    error = %e,
                    id = %submission.id,
                    form_id = %submission.form_id,
                    "notification delivery failed"
                );
            }
        });

        Ok(IntakeOutcome::Accepted { id })
    }
}
