//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs (TCP connect or HTTP GET, bounded by timeout)
//!     → RoutingTable::apply_probe
//!     → state.rs (debounced transition)
//!
//! State machine (state.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     Unhealthy only after consecutive failures reach the threshold
//! ```
//!
//! # Design Decisions
//! - Health state is per-endpoint; volume health is derived from it
//! - Probes never mutate endpoints directly; the table serializes updates
//! - A single success restores an endpoint

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use probe::Prober;
pub use state::{HealthPolicy, ProbeOutcome, Transition};
