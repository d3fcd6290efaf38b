//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to endpoint:
//!     → timeouts.rs (one deadline covering head and body)
//!     → On connect failure: retries.rs (one retry on an alternate endpoint)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Endpoint health is owned by the health tracker, not by request errors

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::RequestDeadline;
