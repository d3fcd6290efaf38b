//! Endpoint health state machine.
//!
//! # State Transitions
//! ```text
//! Unknown/Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unknown/Unhealthy → Healthy: a single successful probe
//! ```
//!
//! Failing fewer than `unhealthy_threshold` probes in a row leaves the state
//! as it was, so one lost probe does not flap an endpoint out of rotation.

use crate::load_balancer::endpoint::HealthState;

/// Result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
}

/// A state change caused by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Debounce policy applied to probe results.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    unhealthy_threshold: u32,
}

impl HealthPolicy {
    pub fn new(unhealthy_threshold: u32) -> Self {
        Self {
            unhealthy_threshold: unhealthy_threshold.max(1),
        }
    }

    pub fn unhealthy_threshold(&self) -> u32 {
        self.unhealthy_threshold
    }

    /// State after a probe, given the consecutive failure count including it.
    pub fn next_state(
        &self,
        current: HealthState,
        outcome: ProbeOutcome,
        consecutive_failures: u32,
    ) -> HealthState {
        match outcome {
            ProbeOutcome::Success => HealthState::Healthy,
            ProbeOutcome::Failure if consecutive_failures >= self.unhealthy_threshold => {
                HealthState::Unhealthy
            }
            ProbeOutcome::Failure => current,
        }
    }
}
