//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the client body up to the configured limit
//! - Strip hop-by-hop headers
//! - Rewrite the URI and `Host` for the selected endpoint
//! - Add `X-Forwarded-*` and propagate `X-Request-ID`
//!
//! # Design Decisions
//! - The body is buffered once so a connect-failure retry can resend it
//! - The client's header map is cloned per attempt; the original is kept
//!   for logging

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    request::Parts,
    uri::{PathAndQuery, Scheme},
    Request, Uri,
};
use futures_util::StreamExt;

use crate::error::ProxyError;
use crate::load_balancer::endpoint::Endpoint;
use crate::routing::VolumePath;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Headers that apply to a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("proxy-connection");
    headers.remove("trailers");
}

/// The request ID assigned by the request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Buffer the request body, failing once it exceeds `limit` bytes.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = stream.next().await {
        // The client stopped sending mid-body; nothing is forwarded
        let chunk = chunk.map_err(|e| {
            tracing::debug!(error = %e, "Request body read failed");
            ProxyError::ClientDisconnected
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(ProxyError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// `http://{endpoint}{rest}[?query]`.
pub fn upstream_uri(endpoint: &Endpoint, path: &VolumePath, query: Option<&str>) -> Result<Uri, ProxyError> {
    let path_and_query = match query {
        Some(q) => format!("{}?{}", path.rest, q),
        None => path.rest.clone(),
    };
    let path_and_query = PathAndQuery::try_from(path_and_query)
        .map_err(|e| ProxyError::InvalidRequest(format!("invalid upstream path: {}", e)))?;

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(endpoint.authority().clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::InvalidRequest(format!("invalid upstream uri: {}", e)))
}

/// Build the request sent to `endpoint` for one forward attempt.
pub fn build_upstream_request(
    parts: &Parts,
    endpoint: &Endpoint,
    path: &VolumePath,
    body: Bytes,
    peer: Option<SocketAddr>,
) -> Result<Request<Body>, ProxyError> {
    let uri = upstream_uri(endpoint, path, parts.uri.query())?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);

    let original_host = headers.remove(header::HOST);
    if let Some(host) = original_host {
        headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host);
    }
    if let Some(peer) = peer {
        append_forwarded_for(&mut headers, peer);
    }
    headers.insert(
        HeaderName::from_static(X_FORWARDED_PROTO),
        HeaderValue::from_static("http"),
    );
    let host = HeaderValue::from_str(endpoint.address())
        .map_err(|e| ProxyError::InvalidRequest(format!("invalid host header: {}", e)))?;
    headers.insert(header::HOST, host);

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(Body::from(body))
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let name = HeaderName::from_static(X_FORWARDED_FOR);
    let ip = peer.ip().to_string();
    let value = match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
