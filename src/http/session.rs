//! Proxy sessions.
//!
//! A session spans one forwarded request from endpoint selection until the
//! last response byte reaches the client. It holds the endpoint's session
//! slot, so `active_sessions` in `/status` counts in-flight transfers.
//!
//! A session dropped before `finish` means the client went away; dropping it
//! is also what drops the upstream request or body, aborting the backend.

use std::time::Instant;

use uuid::Uuid;

use crate::load_balancer::endpoint::EndpointGuard;
use crate::observability::metrics;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    BackendError,
    TimedOut,
    /// The request could not be built for the endpoint.
    Rejected,
}

impl SessionOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::BackendError => "backend_error",
            SessionOutcome::TimedOut => "timed_out",
            SessionOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug)]
pub struct ProxySession {
    id: Uuid,
    request_id: String,
    volume: String,
    endpoint: EndpointGuard,
    started: Instant,
    bytes: u64,
    finished: bool,
}

impl ProxySession {
    pub fn open(request_id: &str, volume: &str, endpoint: EndpointGuard) -> Self {
        metrics::session_started();
        Self {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            volume: volume.to_string(),
            endpoint,
            started: Instant::now(),
            bytes: 0,
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn endpoint(&self) -> &EndpointGuard {
        &self.endpoint
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Move the session to another endpoint after a failed connect.
    pub fn reassign(&mut self, endpoint: EndpointGuard) {
        self.endpoint = endpoint;
    }

    pub fn record_bytes(&mut self, n: usize) {
        self.bytes += n as u64;
    }

    /// End the session normally.
    pub fn finish(mut self, outcome: SessionOutcome) {
        self.finished = true;
        metrics::record_bytes_forwarded(&self.volume, self.bytes);
        tracing::debug!(
            session_id = %self.id,
            request_id = %self.request_id,
            volume = %self.volume,
            endpoint = %self.endpoint.address(),
            bytes = self.bytes,
            outcome = outcome.as_str(),
            duration_ms = self.started.elapsed().as_millis() as u64,
            "Proxy session finished"
        );
    }
}

impl Drop for ProxySession {
    fn drop(&mut self) {
        if !self.finished {
            metrics::record_bytes_forwarded(&self.volume, self.bytes);
            tracing::info!(
                session_id = %self.id,
                request_id = %self.request_id,
                volume = %self.volume,
                endpoint = %self.endpoint.address(),
                bytes = self.bytes,
                duration_ms = self.started.elapsed().as_millis() as u64,
                "Client disconnected, aborting backend request"
            );
        }
        metrics::session_finished();
    }
}
