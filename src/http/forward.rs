//! Request forwarding.
//!
//! # Responsibilities
//! - Send a routed request to its endpoint over a pooled HTTP/1.1 client
//! - Retry once on an alternate endpoint when the connection is refused
//! - Map transport failures to `ProxyError` (502, 504)
//!
//! # Design Decisions
//! - One deadline per request covers the body read, every attempt, and the
//!   streamed response body
//! - The backend sees a request only once; nothing is retried after the
//!   request may have been written

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::http::request::{self, build_upstream_request};
use crate::http::response::proxy_response;
use crate::http::session::{ProxySession, SessionOutcome};
use crate::observability::metrics;
use crate::resilience::{RequestDeadline, RetryPolicy};
use crate::routing::{RequestRouter, Route};

/// Forwards routed requests to backend endpoints.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
    max_body_size: usize,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, limits: &LimitsConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            request_timeout: Duration::from_secs(timeouts.request_secs),
            max_body_size: limits.max_body_size,
        }
    }

    /// Forward a routed request and return the streaming client response.
    pub async fn forward(
        &self,
        router: &RequestRouter,
        route: Route,
        request: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response, ProxyError> {
        let deadline = RequestDeadline::after(self.request_timeout);
        let volume = route.volume_name().to_string();
        let timeout = || ProxyError::Timeout {
            volume: volume.clone(),
            timeout_secs: self.request_timeout.as_secs(),
        };

        let (parts, body) = request.into_parts();
        let request_id = request::request_id(&parts.headers).to_string();

        let body = deadline
            .run(request::read_body(&parts.headers, body, self.max_body_size))
            .await
            .map_err(|_| timeout())??;

        let mut endpoint = route.selection.endpoint.clone();
        let mut session = ProxySession::open(&request_id, &volume, endpoint.acquire());
        let mut retries = RetryPolicy::new();

        loop {
            let upstream = match build_upstream_request(&parts, &endpoint, &route.path, body.clone(), peer) {
                Ok(upstream) => upstream,
                Err(e) => {
                    session.finish(SessionOutcome::Rejected);
                    return Err(e);
                }
            };

            tracing::debug!(
                request_id = %request_id,
                session_id = %session.id(),
                volume = %volume,
                endpoint = %endpoint.address(),
                degraded = route.selection.degraded,
                "Forwarding request"
            );

            match deadline.run(self.client.request(upstream)).await {
                Ok(Ok(response)) => {
                    return Ok(proxy_response(
                        response,
                        session,
                        deadline.instant(),
                        route.selection.degraded,
                    ));
                }
                Ok(Err(err)) => {
                    if retries.should_retry(&err) {
                        if let Some(next) = router.alternate(&route, &endpoint) {
                            tracing::warn!(
                                request_id = %request_id,
                                volume = %volume,
                                failed = %endpoint.address(),
                                retry = %next.address(),
                                error = %err,
                                "Backend connect failed, retrying on alternate endpoint"
                            );
                            metrics::record_retry(&volume);
                            session.reassign(next.acquire());
                            endpoint = next;
                            continue;
                        }
                    }

                    tracing::error!(
                        request_id = %request_id,
                        volume = %volume,
                        endpoint = %endpoint.address(),
                        attempt = retries.attempts() + 1,
                        error = %err,
                        "Upstream error"
                    );
                    session.finish(SessionOutcome::BackendError);
                    return Err(ProxyError::BackendUnreachable {
                        volume: volume.clone(),
                        address: endpoint.address().to_string(),
                        message: error_chain(&err),
                    });
                }
                Err(_) => {
                    tracing::warn!(
                        request_id = %request_id,
                        volume = %volume,
                        endpoint = %endpoint.address(),
                        timeout_secs = self.request_timeout.as_secs(),
                        "Upstream request timed out"
                    );
                    session.finish(SessionOutcome::TimedOut);
                    return Err(timeout());
                }
            }
        }
    }
}

/// Render an error with its sources, e.g. "client error (Connect): tcp connect error: refused".
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
