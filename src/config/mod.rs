//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)                provider files (<provider>-proxy.conf)
//!     → loader.rs (parse)               → provider_file.rs (VOLUME_<NAME>_PORT=<port>)
//!     → validation.rs (semantic checks)         │
//!     → ProxyConfig ───────────────┬────────────┘
//!                                  → loader::resolve_volumes (merge)
//!                                  → RoutingTable
//!
//! On reload (file watcher, SIGHUP, POST /admin/reload):
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → RoutingTable::replace_all (single atomic swap)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the volume set is hot-reloadable; listener and timeouts need a restart

pub mod loader;
pub mod provider_file;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, resolve_volumes, ConfigError};
pub use schema::{
    EndpointConfig, HealthCheckConfig, LimitsConfig, ListenerConfig, ObservabilityConfig,
    ProbeKind, Provider, ProviderFilesConfig, ProxyConfig, RoutingConfig, TimeoutConfig,
    VolumeConfig,
};
pub use validation::ValidationError;
