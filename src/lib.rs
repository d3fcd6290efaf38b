//! Volume-aware reverse proxy library.
//!
//! Routes `/volume/{name}/...` requests to the healthy endpoints of named
//! storage volumes spread across cloud providers.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use routing::RoutingTable;
