//! Bounded retry with exponential backoff.
//!
//! Used by the stages that talk to flaky collaborators (captions
//! extraction, captions upload, transcode) and by each segment upload
//! batch. Backoff sleeps on the tokio timer, never on the worker thread.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::metrics;

/// Attempts allowed for a retried pipeline stage.
///
/// Nothing sleeps after the last attempt, so a stage that always fails
/// waits `base` then `2 * base` (1 s then 2 s by default) before giving up.
pub const STAGE_MAX_ATTEMPTS: u32 = 3;
/// Attempts allowed for one segment upload batch.
pub const BATCH_MAX_ATTEMPTS: u32 = 5;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each attempt.
    pub base_delay: Duration,
    /// Operation name for logging and metrics.
    pub operation_name: String,
}

impl RetryPolicy {
    pub fn new(operation_name: impl Into<String>, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            operation_name: operation_name.into(),
        }
    }

    /// Policy for a retried pipeline stage.
    pub fn stage(operation_name: impl Into<String>, base_delay: Duration) -> Self {
        Self::new(operation_name, STAGE_MAX_ATTEMPTS, base_delay)
    }

    /// Policy for one segment upload batch.
    pub fn batch_upload(base_delay: Duration) -> Self {
        Self::new("segment_batch_upload", BATCH_MAX_ATTEMPTS, base_delay)
    }

    /// Delay after failed attempt number `attempt` (counted from 0): `base * 2^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Passed to the operation on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn is_last(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed permanently or after all attempts were used.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation with retry logic.
///
/// Errors for which `is_retryable` returns false end the loop at once.
pub async fn retry_async<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(RetryState) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        let state = RetryState {
            attempt,
            max_attempts: policy.max_attempts,
        };

        match operation(state).await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if !state.is_last() && is_retryable(&e) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = %policy.operation_name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    "{} attempt {} failed, retrying in {:?}: {}",
                    policy.operation_name,
                    attempt + 1,
                    delay,
                    e
                );
                metrics::record_retry(&policy.operation_name);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                }
            }
        }
    }
}
