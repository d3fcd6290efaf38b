//! Timeout enforcement.
//!
//! # Responsibilities
//! - Fix one deadline per forwarded request at the moment it is routed
//! - Bound the backend call and every response body chunk by that deadline
//!
//! # Design Decisions
//! - Uses Tokio's `timeout_at`, so retries and streaming share the same
//!   budget instead of each getting a fresh one
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, error::Elapsed, Instant};

/// Absolute deadline for one request/response cycle.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline {
    at: Instant,
}

impl RequestDeadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Run `fut` until the deadline.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        time::timeout_at(self.at, fut).await
    }
}
