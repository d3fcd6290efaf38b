//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Volume resolved → its ordered endpoints
//!     → round_robin.rs (rotate through routable endpoints)
//!     → nothing routable: fallback_endpoint (most recently healthy)
//!     → endpoint.rs (acquire a session guard)
//! ```
//!
//! # Design Decisions
//! - Each volume owns its balancer, so cursors are per volume
//! - Unhealthy endpoints excluded from normal selection
//! - Session counting through RAII guards, released on every exit path

use std::fmt::Debug;
use std::sync::Arc;

pub mod endpoint;
pub mod round_robin;

use endpoint::Endpoint;

/// Endpoint selection algorithm.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick the next routable endpoint, or `None` if there is none.
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;

    /// Best-effort pick when no endpoint is routable.
    fn fallback_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}
