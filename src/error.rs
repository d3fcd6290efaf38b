//! Request-scoped proxy errors.
//!
//! Every failure while routing or forwarding a request is a `ProxyError`.
//! They are converted to a JSON status response at the handler boundary, so
//! no single request can take the process down.
//!
//! `ClientDisconnected` covers a client that leaves while its request body
//! is still being read. A client that leaves while the response streams is
//! handled by dropping the body, which releases the endpoint session.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors produced while routing or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The path has no volume name segment.
    #[error("malformed volume path '{path}': expected /volume/{{name}}[/...]")]
    MalformedPath { path: String },

    #[error("Volume {name} not found")]
    UnknownVolume { name: String },

    /// The volume exists but none of its endpoints can take traffic.
    #[error("volume {volume} has no healthy endpoint")]
    NoHealthyEndpoint { volume: String },

    #[error("backend for volume {volume} unreachable at {address}: {message}")]
    BackendUnreachable {
        volume: String,
        address: String,
        message: String,
    },

    #[error("request to volume {volume} timed out after {timeout_secs}s")]
    Timeout { volume: String, timeout_secs: u64 },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client went away; nobody is left to receive a response.
    #[error("client disconnected")]
    ClientDisconnected,
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MalformedPath { .. } | ProxyError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::UnknownVolume { .. } => StatusCode::NOT_FOUND,
            ProxyError::NoHealthyEndpoint { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            // nginx's "client closed request"; never actually written
            ProxyError::ClientDisconnected => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// Short machine-readable kind used in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedPath { .. } => "malformed_path",
            ProxyError::UnknownVolume { .. } => "unknown_volume",
            ProxyError::NoHealthyEndpoint { .. } => "no_healthy_endpoint",
            ProxyError::BackendUnreachable { .. } => "backend_unreachable",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::PayloadTooLarge { .. } => "payload_too_large",
            ProxyError::InvalidRequest(_) => "invalid_request",
            ProxyError::ClientDisconnected => "client_disconnected",
        }
    }

    /// Volume the error relates to, if any.
    pub fn volume(&self) -> Option<&str> {
        match self {
            ProxyError::UnknownVolume { name } => Some(name),
            ProxyError::NoHealthyEndpoint { volume }
            | ProxyError::BackendUnreachable { volume, .. }
            | ProxyError::Timeout { volume, .. } => Some(volume),
            _ => None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ProxyError::ClientDisconnected = self {
            return status.into_response();
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Some(volume) = self.volume() {
            body["volume"] = json!(volume);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        let cases = [
            (ProxyError::MalformedPath { path: "/volume".into() }, 400),
            (ProxyError::UnknownVolume { name: "x".into() }, 404),
            (ProxyError::NoHealthyEndpoint { volume: "x".into() }, 503),
            (
                ProxyError::BackendUnreachable {
                    volume: "x".into(),
                    address: "10.0.0.1:1".into(),
                    message: "refused".into(),
                },
                502,
            ),
            (ProxyError::Timeout { volume: "x".into(), timeout_secs: 30 }, 504),
            (ProxyError::PayloadTooLarge { limit: 1 }, 413),
        ];
        for (error, status) in cases {
            assert_eq!(error.status().as_u16(), status, "{error}");
        }
    }

    #[tokio::test]
    async fn unknown_volume_body_names_volume() {
        let response = ProxyError::UnknownVolume { name: "does-not-exist".into() }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "unknown_volume");
        assert_eq!(body["volume"], "does-not-exist");
        assert_eq!(body["message"], "Volume does-not-exist not found");
    }

    #[tokio::test]
    async fn client_disconnect_has_no_body() {
        let response = ProxyError::ClientDisconnected.into_response();
        assert_eq!(response.status().as_u16(), 499);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
