//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util auto connection, Axum route table)
//!     → handlers.rs (/status, /health, fallback, /volume/...)
//!     → routing layer resolves volume and endpoint
//!     → forward.rs (deadline, connect-failure retry)
//!         → request.rs (read body, strip hop-by-hop, rewrite URI/Host)
//!         → session.rs (endpoint session slot, disconnect detection)
//!     → response.rs (strip headers, stream body)
//!     → Send to client
//! ```

pub mod forward;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod session;

pub use forward::Forwarder;
pub use request::X_REQUEST_ID;
pub use response::{X_PROXY_DEGRADED, X_PROXY_ENDPOINT};
pub use server::{AppState, ProxyServer};
pub use session::{ProxySession, SessionOutcome};
