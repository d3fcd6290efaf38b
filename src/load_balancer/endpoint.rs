//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint of a volume
//! - Track health state and probe history
//! - Track active proxy sessions through an RAII guard

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::uri::Authority;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::Provider;
use crate::health::state::{HealthPolicy, ProbeOutcome, Transition};

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        })
    }
}

/// A single backend endpoint.
#[derive(Debug)]
pub struct Endpoint {
    /// Backend address (`host:port`).
    authority: Authority,
    /// Provider hosting the endpoint.
    provider: Provider,

    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    /// Consecutive failed probes.
    consecutive_failures: AtomicU32,
    /// Unix millis of the last probe, 0 if never probed.
    last_probe_ms: AtomicI64,
    /// Unix millis of the last successful probe, 0 if never healthy.
    last_healthy_ms: AtomicI64,
    /// Number of proxy sessions currently using this endpoint.
    active_sessions: AtomicUsize,
}

impl Endpoint {
    /// Create a new endpoint in the `Unknown` state.
    pub fn new(authority: Authority, provider: Provider) -> Self {
        Self {
            authority,
            provider,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            last_probe_ms: AtomicI64::new(0),
            last_healthy_ms: AtomicI64::new(0),
            active_sessions: AtomicUsize::new(0),
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Address as `host:port`.
    pub fn address(&self) -> &str {
        self.authority.as_str()
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// True if the endpoint may receive traffic (Healthy or Unknown).
    pub fn is_routable(&self) -> bool {
        self.health() != HealthState::Unhealthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn last_probe(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_probe_ms.load(Ordering::Relaxed))
    }

    pub fn last_healthy(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_healthy_ms.load(Ordering::Relaxed))
    }

    /// Raw last-healthy timestamp, used to rank fallback candidates.
    pub(crate) fn last_healthy_millis(&self) -> i64 {
        self.last_healthy_ms.load(Ordering::Relaxed)
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// True if both endpoints point at the same backend.
    pub fn same_target(&self, other: &Endpoint) -> bool {
        self.authority == other.authority && self.provider == other.provider
    }

    /// Start a session on this endpoint. The count drops when the guard does.
    pub fn acquire(self: &Arc<Self>) -> EndpointGuard {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        EndpointGuard {
            endpoint: self.clone(),
        }
    }

    // --- Health Logic ---

    /// Apply one probe result. Only the routing table calls this, under its
    /// writer lock.
    pub(crate) fn record_probe(
        &self,
        outcome: ProbeOutcome,
        policy: &HealthPolicy,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let now_ms = now.timestamp_millis();
        self.last_probe_ms.store(now_ms, Ordering::Relaxed);

        let failures = match outcome {
            ProbeOutcome::Success => {
                self.last_healthy_ms.store(now_ms, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                0
            }
            ProbeOutcome::Failure => self
                .consecutive_failures
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1),
        };

        let from = self.health();
        let to = policy.next_state(from, outcome, failures);
        if from == to {
            return None;
        }
        self.state.store(to as u8, Ordering::Release);
        Some(Transition { from, to })
    }

    /// Copy health history from the endpoint this one replaces on reload.
    pub(crate) fn inherit_health(&self, previous: &Endpoint) {
        self.state
            .store(previous.state.load(Ordering::Acquire), Ordering::Release);
        self.consecutive_failures
            .store(previous.consecutive_failures(), Ordering::Relaxed);
        self.last_probe_ms.store(
            previous.last_probe_ms.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
        self.last_healthy_ms
            .store(previous.last_healthy_millis(), Ordering::Relaxed);
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// A RAII guard that holds one session slot on an endpoint.
#[derive(Debug)]
pub struct EndpointGuard {
    endpoint: Arc<Endpoint>,
}

impl EndpointGuard {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }
}

impl Deref for EndpointGuard {
    type Target = Endpoint;
    fn deref(&self) -> &Self::Target {
        &self.endpoint
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        self.endpoint.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Arc<Endpoint> {
        Arc::new(Endpoint::new(
            Authority::from_static("10.0.0.1:2379"),
            Provider::Aws,
        ))
    }

    #[test]
    fn starts_unknown_and_routable() {
        let e = endpoint();
        assert_eq!(e.health(), HealthState::Unknown);
        assert!(e.is_routable());
        assert!(e.last_probe().is_none());
    }

    #[test]
    fn guard_releases_session_slot() {
        let e = endpoint();
        let g1 = e.acquire();
        let g2 = e.acquire();
        assert_eq!(e.active_sessions(), 2);
        drop(g1);
        assert_eq!(e.active_sessions(), 1);
        drop(g2);
        assert_eq!(e.active_sessions(), 0);
    }

    #[test]
    fn probe_updates_timestamps() {
        let e = endpoint();
        let policy = HealthPolicy::new(3);
        let now = Utc::now();
        let t = e.record_probe(ProbeOutcome::Success, &policy, now).unwrap();
        assert_eq!(t.to, HealthState::Healthy);
        assert_eq!(e.last_probe().map(|d| d.timestamp_millis()), Some(now.timestamp_millis()));
        assert_eq!(e.last_healthy_millis(), now.timestamp_millis());
    }

    #[test]
    fn inherit_copies_state() {
        let old = endpoint();
        let policy = HealthPolicy::new(1);
        old.record_probe(ProbeOutcome::Failure, &policy, Utc::now());
        let new = endpoint();
        new.inherit_health(&old);
        assert_eq!(new.health(), HealthState::Unhealthy);
        assert_eq!(new.consecutive_failures(), 1);
    }
}
