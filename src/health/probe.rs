//! Endpoint probes.
//!
//! A probe is either a bare TCP connect or an HTTP `GET` of the configured
//! path. Every probe is bounded by the probe timeout; timeouts and errors
//! are failures, never panics.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::{HealthCheckConfig, ProbeKind};
use crate::health::state::ProbeOutcome;
use crate::load_balancer::endpoint::Endpoint;

const USER_AGENT: &str = concat!("volume-proxy-health-check/", env!("CARGO_PKG_VERSION"));

/// Probes endpoints according to the health check configuration.
#[derive(Debug, Clone)]
pub struct Prober {
    kind: ProbeKind,
    path: String,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl Prober {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeout_secs)));
        // Probes open a fresh connection each time so a dead backend is not
        // hidden behind a pooled socket.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            kind: config.probe,
            path: config.path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        }
    }

    /// Probe one endpoint.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        let result = match self.kind {
            ProbeKind::Tcp => time::timeout(self.timeout, self.probe_tcp(endpoint)).await,
            ProbeKind::Http => time::timeout(self.timeout, self.probe_http(endpoint)).await,
        };

        match result {
            Ok(Ok(())) => ProbeOutcome::Success,
            Ok(Err(reason)) => {
                tracing::debug!(endpoint = %endpoint.address(), reason = %reason, "Probe failed");
                ProbeOutcome::Failure
            }
            Err(_) => {
                tracing::debug!(
                    endpoint = %endpoint.address(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out"
                );
                ProbeOutcome::Failure
            }
        }
    }

    async fn probe_tcp(&self, endpoint: &Endpoint) -> Result<(), String> {
        TcpStream::connect(endpoint.address())
            .await
            .map(drop)
            .map_err(|e| format!("connect error: {}", e))
    }

    async fn probe_http(&self, endpoint: &Endpoint) -> Result<(), String> {
        let request = Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", endpoint.address(), self.path))
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|e| format!("invalid probe request: {}", e))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| format!("request error: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("non-success status {}", response.status()))
        }
    }
}
