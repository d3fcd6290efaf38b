//! Route handlers for the proxy's own endpoints and the volume proxy.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::Provider;
use crate::error::ProxyError;
use crate::http::request;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::table::VolumeSnapshot;
use crate::routing::VolumeHealth;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub proxy_server: &'static str,
    pub volumes: usize,
    pub providers: Vec<Provider>,
    pub mappings: BTreeMap<String, VolumeSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    let snapshot = state.table.snapshot();
    let mut providers: Vec<Provider> = snapshot.providers.into_iter().collect();
    providers.sort_by_key(|p| p.as_str());
    Json(StatusReport {
        proxy_server: "active",
        volumes: snapshot.volumes.len(),
        providers,
        mappings: snapshot.volumes,
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    if !state.table.is_initialized() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport { status: "degraded", timestamp }),
        );
    }

    let all_routable = state
        .table
        .snapshot()
        .volumes
        .values()
        .all(|v| !matches!(v.health, VolumeHealth::Unhealthy | VolumeHealth::Empty));
    let status = if all_routable { "healthy" } else { "degraded" };
    (StatusCode::OK, Json(HealthReport { status, timestamp }))
}

/// Fallback: stray `/volume` paths the route table did not match still get
/// volume path errors; everything else gets the informational payload.
pub async fn fallback(state: State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path();
    if path == "/volume" || path.starts_with("/volume/") {
        return proxy_volume(state, request).await;
    }
    info().await.into_response()
}

/// Informational payload listing the proxy's endpoints.
pub async fn info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Multi-Cloud Kubernetes Proxy Server",
        "endpoints": [
            "/status",
            "/health",
            "/volume/{name}/...",
            "/admin/reload",
        ],
    }))
}

/// `/volume/...`: route and forward to the volume's endpoint.
pub async fn proxy_volume(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request::request_id(request.headers()).to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let result = match state.router.route(&path) {
        Ok(route) => {
            let volume = route.volume_name().to_string();
            let response = state
                .forwarder
                .forward(&state.router, route, request, peer)
                .await;
            (volume, response)
        }
        Err(e) => (e.volume().unwrap_or("none").to_string(), Err(e)),
    };

    let (volume, response) = match result {
        (volume, Ok(response)) => (volume, response),
        (volume, Err(e)) => {
            log_rejection(&request_id, &method, &path, &e);
            (volume, e.into_response())
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &volume, start);
    response
}

fn log_rejection(request_id: &str, method: &str, path: &str, error: &ProxyError) {
    match error {
        ProxyError::UnknownVolume { .. }
        | ProxyError::MalformedPath { .. }
        | ProxyError::ClientDisconnected => tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            error = %error,
            "Request rejected"
        ),
        _ => tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = error.status().as_u16(),
            error = %error,
            "Request failed"
        ),
    }
}
