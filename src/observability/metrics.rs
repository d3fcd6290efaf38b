//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, volume
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_endpoint_health` (gauge): 1=routable, 0=unhealthy
//! - `proxy_forward_retries_total` (counter): retries against an alternate
//! - `proxy_bytes_forwarded_total` (counter): response bytes per volume
//! - `proxy_sessions_active` (gauge): in-flight proxy sessions
//!
//! Without an installed recorder every call is a no-op, so tests and
//! metrics-disabled deployments pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, volume: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("volume", volume.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_endpoint_health(endpoint: &str, provider: &str, routable: bool) {
    gauge!(
        "proxy_endpoint_health",
        "endpoint" => endpoint.to_string(),
        "provider" => provider.to_string()
    )
    .set(if routable { 1.0 } else { 0.0 });
}

pub fn record_retry(volume: &str) {
    counter!("proxy_forward_retries_total", "volume" => volume.to_string()).increment(1);
}

pub fn record_bytes_forwarded(volume: &str, bytes: u64) {
    counter!("proxy_bytes_forwarded_total", "volume" => volume.to_string()).increment(bytes);
}

pub fn session_started() {
    gauge!("proxy_sessions_active").increment(1.0);
}

pub fn session_finished() {
    gauge!("proxy_sessions_active").decrement(1.0);
}
