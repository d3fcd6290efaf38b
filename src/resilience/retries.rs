//! Retry decisions.
//!
//! # Responsibilities
//! - Decide whether a failed forward attempt may be retried
//! - Cap retries at a single attempt against an alternate endpoint
//!
//! # Design Decisions
//! - Only connection establishment failures are retryable: the backend
//!   never saw the request, so any method is safe to resend
//! - Errors after the request was written (reset, bad response) are final

use hyper_util::client::legacy::Error as ClientError;

/// Maximum extra attempts per request.
pub const MAX_RETRIES: usize = 1;

/// Tracks retry attempts for one request.
#[derive(Debug, Default)]
pub struct RetryPolicy {
    attempts: usize,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true (and consumes an attempt) if `err` may be retried.
    pub fn should_retry(&mut self, err: &ClientError) -> bool {
        if self.attempts >= MAX_RETRIES || !is_retryable(err) {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

/// Whether the error happened before the request reached the backend.
pub fn is_retryable(err: &ClientError) -> bool {
    err.is_connect()
}
