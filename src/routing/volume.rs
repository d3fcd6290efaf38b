//! Volumes and endpoint selection.

use std::sync::Arc;

use serde::Serialize;

use crate::error::ProxyError;
use crate::load_balancer::{
    endpoint::{Endpoint, HealthState},
    round_robin::RoundRobin,
    LoadBalancer,
};

/// How selection behaves when no endpoint is routable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionPolicy {
    /// Fail with `NoHealthyEndpoint` instead of degrading.
    pub fail_fast: bool,
}

/// Aggregate health of a volume's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeHealth {
    /// Every endpoint is healthy.
    Healthy,
    /// Some endpoints are unhealthy, at least one is routable.
    Degraded,
    /// No endpoint is routable.
    Unhealthy,
    /// Routable, but not every endpoint has been probed yet.
    Unknown,
    /// The volume has no endpoints.
    Empty,
}

/// A named volume and its ordered candidate endpoints.
///
/// The endpoint list never changes after construction; updates replace the
/// whole `Volume` in the routing table.
#[derive(Debug)]
pub struct Volume {
    name: String,
    endpoints: Vec<Arc<Endpoint>>,
    balancer: Box<dyn LoadBalancer>,
}

/// Result of selecting an endpoint for a request.
#[derive(Debug, Clone)]
pub struct Selection {
    pub volume: Arc<Volume>,
    pub endpoint: Arc<Endpoint>,
    /// True when no endpoint was healthy and a fallback was chosen.
    pub degraded: bool,
}

impl Volume {
    pub fn new(name: impl Into<String>, endpoints: Vec<Arc<Endpoint>>) -> Self {
        Self {
            name: name.into(),
            endpoints,
            balancer: Box::new(RoundRobin::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Select the next endpoint for a request.
    pub fn select(self: &Arc<Self>, policy: SelectionPolicy) -> Result<Selection, ProxyError> {
        if let Some(endpoint) = self.balancer.next_endpoint(&self.endpoints) {
            return Ok(Selection {
                volume: self.clone(),
                endpoint,
                degraded: false,
            });
        }

        let unroutable = || ProxyError::NoHealthyEndpoint {
            volume: self.name.clone(),
        };
        if policy.fail_fast {
            return Err(unroutable());
        }

        let endpoint = self
            .balancer
            .fallback_endpoint(&self.endpoints)
            .ok_or_else(unroutable)?;
        tracing::warn!(
            volume = %self.name,
            endpoint = %endpoint.address(),
            "No healthy endpoint, degrading to most recently healthy"
        );
        Ok(Selection {
            volume: self.clone(),
            endpoint,
            degraded: true,
        })
    }

    /// Next candidate after `failed`, for a single retry.
    pub fn alternate(&self, failed: &Endpoint, policy: SelectionPolicy) -> Option<Arc<Endpoint>> {
        let others: Vec<Arc<Endpoint>> = self
            .endpoints
            .iter()
            .filter(|e| !e.same_target(failed))
            .cloned()
            .collect();

        self.balancer.next_endpoint(&others).or_else(|| {
            if policy.fail_fast {
                None
            } else {
                self.balancer.fallback_endpoint(&others)
            }
        })
    }

    /// True if at least one endpoint may receive traffic.
    pub fn is_routable(&self) -> bool {
        self.endpoints.iter().any(|e| e.is_routable())
    }

    pub fn health(&self) -> VolumeHealth {
        if self.endpoints.is_empty() {
            return VolumeHealth::Empty;
        }
        if !self.is_routable() {
            return VolumeHealth::Unhealthy;
        }

        let states: Vec<HealthState> = self.endpoints.iter().map(|e| e.health()).collect();
        if states.iter().all(|s| *s == HealthState::Healthy) {
            VolumeHealth::Healthy
        } else if states.contains(&HealthState::Unhealthy) {
            VolumeHealth::Degraded
        } else {
            VolumeHealth::Unknown
        }
    }

    /// True if both volumes list the same targets in the same order.
    pub(crate) fn same_targets(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        self.endpoints.len() == endpoints.len()
            && self
                .endpoints
                .iter()
                .zip(endpoints)
                .all(|(a, b)| a.same_target(b))
    }
}
