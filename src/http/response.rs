//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from the backend response
//! - Tag the response with the serving endpoint
//! - Stream the backend body to the client under the request deadline
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - The body stream owns the `ProxySession`; dropping the stream (client
//!   gone) drops the session and the upstream body with it

use std::io;

use axum::body::{Body, BodyDataStream, Bytes};
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;
use tokio::time::{self, Instant};

use crate::http::request::strip_hop_by_hop;
use crate::http::session::{ProxySession, SessionOutcome};

pub const X_PROXY_ENDPOINT: &str = "x-proxy-endpoint";
pub const X_PROXY_DEGRADED: &str = "x-proxy-degraded";

struct BodyState {
    upstream: BodyDataStream,
    session: Option<ProxySession>,
    deadline: Instant,
}

/// Turn a backend response into the client response.
pub fn proxy_response(
    response: Response<Incoming>,
    session: ProxySession,
    deadline: Instant,
    degraded: bool,
) -> Response {
    let (mut parts, body) = response.into_parts();

    strip_hop_by_hop(&mut parts.headers);
    if let Ok(value) = HeaderValue::from_str(session.endpoint().address()) {
        parts
            .headers
            .insert(HeaderName::from_static(X_PROXY_ENDPOINT), value);
    }
    if degraded {
        parts.headers.insert(
            HeaderName::from_static(X_PROXY_DEGRADED),
            HeaderValue::from_static("true"),
        );
    }

    let state = BodyState {
        upstream: Body::new(body).into_data_stream(),
        session: Some(session),
        deadline,
    };
    Response::from_parts(parts, Body::from_stream(stream::unfold(state, next_chunk)))
}

async fn next_chunk(mut state: BodyState) -> Option<(Result<Bytes, io::Error>, BodyState)> {
    // Session already closed: the stream has ended
    if state.session.is_none() {
        return None;
    }

    match time::timeout_at(state.deadline, state.upstream.next()).await {
        Ok(Some(Ok(chunk))) => {
            if let Some(session) = state.session.as_mut() {
                session.record_bytes(chunk.len());
            }
            Some((Ok(chunk), state))
        }
        Ok(Some(Err(e))) => {
            if let Some(session) = state.session.take() {
                tracing::warn!(
                    volume = %session.volume(),
                    endpoint = %session.endpoint().address(),
                    error = %e,
                    "Backend response body failed"
                );
                session.finish(SessionOutcome::BackendError);
            }
            Some((Err(io::Error::other(e)), state))
        }
        Ok(None) => {
            if let Some(session) = state.session.take() {
                session.finish(SessionOutcome::Completed);
            }
            None
        }
        Err(_) => {
            if let Some(session) = state.session.take() {
                tracing::warn!(
                    volume = %session.volume(),
                    endpoint = %session.endpoint().address(),
                    bytes = session.bytes(),
                    "Response body exceeded request deadline"
                );
                session.finish(SessionOutcome::TimedOut);
            }
            Some((
                Err(io::Error::new(io::ErrorKind::TimedOut, "response deadline exceeded")),
                state,
            ))
        }
    }
}
