// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-side retry policy with exponential backoff + jitter.
//
// The job itself never retries.  These helpers classify a failure into
// Transient (retry), UserAction (wait for the operator), and Permanent (give
// up) so a caller can build its own loop.

use std::time::Duration;

use rawspool_core::error::{JobFailure, RawSpoolError};
use rawspool_core::types::{ErrorClass, JobStage};
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the error is permanent or the operator must act.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `RawSpoolError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &RawSpoolError) -> ErrorClass {
    match err {
        RawSpoolError::NotFound { .. } => ErrorClass::UserAction,
        RawSpoolError::Open { source, .. } => classify_open_detail(&source.message),
        RawSpoolError::Enumeration(_)
        | RawSpoolError::Document { .. }
        | RawSpoolError::Page { .. }
        | RawSpoolError::Write { .. }
        | RawSpoolError::TimedOut { .. } => ErrorClass::Transient,
        RawSpoolError::Cleanup { .. } | RawSpoolError::TaskAborted(_) => ErrorClass::UserAction,
        RawSpoolError::Config(_)
        | RawSpoolError::BackendUnavailable(_)
        | RawSpoolError::Serialization(_) => ErrorClass::Permanent,
        RawSpoolError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Transient,
        },
    }
}

/// Permission and unknown-printer failures need an operator; anything else
/// (offline, busy, refused) may clear on its own.
fn classify_open_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("permission")
        || lower.contains("access denied")
        || lower.contains("forbidden")
        || lower.contains("invalid printer name")
        || lower.contains("unknown destination")
    {
        return ErrorClass::UserAction;
    }
    ErrorClass::Transient
}

/// Whether re-submitting cannot duplicate output: the failure happened before
/// the spooler accepted a document.
pub fn is_safe_to_resubmit(failure: &JobFailure) -> bool {
    matches!(
        failure.primary.stage(),
        Some(JobStage::Open | JobStage::BeginDocument)
    )
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &RawSpoolError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!("permanent error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!("operator action required, not retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);
    Duration::from_millis(capped_ms)
}

/// Deterministic spread across [0, base).
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
