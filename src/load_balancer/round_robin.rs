//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through endpoints.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the cursor and return its previous value.
    fn advance(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        // Cursor indexes the routable subset, not the full list
        let routable: Vec<&Arc<Endpoint>> = endpoints.iter().filter(|e| e.is_routable()).collect();
        if routable.is_empty() {
            return None;
        }

        let index = self.advance() % routable.len();
        Some(routable[index].clone())
    }

    fn fallback_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }

        // Most recently seen healthy wins; never-healthy endpoints (0) rank
        // last and ties keep cursor order.
        let start = self.advance();
        let len = endpoints.len();
        let mut best: Option<&Arc<Endpoint>> = None;
        for i in 0..len {
            let candidate = &endpoints[(start + i) % len];
            match best {
                Some(b) if b.last_healthy_millis() >= candidate.last_healthy_millis() => {}
                _ => best = Some(candidate),
            }
        }
        best.cloned()
    }
}
