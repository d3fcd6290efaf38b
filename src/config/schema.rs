//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid configuration.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the volume proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Volumes declared inline, each with its candidate endpoints.
    pub volumes: Vec<VolumeConfig>,

    /// Per-provider `VOLUME_<NAME>_PORT=<port>` files.
    pub provider_files: ProviderFilesConfig,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Endpoint selection behaviour.
    pub routing: RoutingConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    ///
    /// Falls back to `0.0.0.0:<port>` when the configured address does not parse.
    pub fn set_port(&mut self, port: u16) {
        let addr = match self.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr
            }
            Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
        };
        self.bind_address = addr.to_string();
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Cloud provider hosting an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
    Ibm,
    Digitalocean,
}

impl Provider {
    /// Every provider, in the order provider files are loaded.
    pub const ALL: [Provider; 5] = [
        Provider::Aws,
        Provider::Azure,
        Provider::Gcp,
        Provider::Ibm,
        Provider::Digitalocean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::Ibm => "ibm",
            Provider::Digitalocean => "digitalocean",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

/// A volume and its ordered candidate endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VolumeConfig {
    /// Unique volume name, used as the `/volume/{name}` path segment.
    pub name: String,

    /// Candidate endpoints, in round-robin order.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// A single backend endpoint for a volume.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Backend address as `host:port`.
    pub address: String,

    /// Provider hosting this endpoint.
    pub provider: Provider,
}

/// Location of the per-provider volume files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderFilesConfig {
    /// Directory holding `<provider>-proxy.conf` files. Disabled when unset.
    pub directory: Option<PathBuf>,

    /// Host used for provider file ports when no per-provider host is set.
    pub default_host: String,

    /// Per-provider backend host, keyed by lowercase provider name.
    pub hosts: HashMap<String, String>,
}

impl ProviderFilesConfig {
    /// Backend host for ports listed in the given provider's file.
    pub fn host_for(&self, provider: Provider) -> &str {
        self.hosts
            .get(provider.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default_host)
    }
}

impl Default for ProviderFilesConfig {
    fn default() -> Self {
        Self {
            directory: None,
            default_host: "127.0.0.1".to_string(),
            hosts: HashMap::new(),
        }
    }
}

/// How endpoints are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// TCP connect succeeds.
    Tcp,
    /// `GET <path>` returns a 2xx status.
    Http,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Probe kind.
    pub probe: ProbeKind,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            timeout_secs: 2,
            probe: ProbeKind::Tcp,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time for a forwarded request/response cycle in seconds.
    pub request_secs: u64,

    /// Idle pooled backend connection timeout in seconds.
    pub idle_secs: u64,

    /// How long shutdown waits for in-flight connections to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 90,
            shutdown_grace_secs: 10,
        }
    }
}

/// Endpoint selection behaviour.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Return 503 when no endpoint is healthy instead of degrading to the
    /// least-recently-unhealthy one.
    pub fail_fast: bool,
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.health_check.interval_secs, 5);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(!config.routing.fail_fast);
        assert!(config.volumes.is_empty());
    }

    #[test]
    fn parses_volumes_and_provider_hosts() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [provider_files]
            directory = "/opt/nix-volumes/networking/proxy"
            [provider_files.hosts]
            azure = "10.1.0.1"

            [[volumes]]
            name = "etcd-1"
            endpoints = [
                { address = "10.0.0.1:2379", provider = "aws" },
                { address = "10.0.0.2:2379", provider = "azure" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.volumes.len(), 1);
        assert_eq!(config.volumes[0].endpoints[1].provider, Provider::Azure);
        assert_eq!(config.provider_files.host_for(Provider::Azure), "10.1.0.1");
        assert_eq!(config.provider_files.host_for(Provider::Gcp), "127.0.0.1");
    }

    #[test]
    fn set_port_keeps_host() {
        let mut listener = ListenerConfig {
            bind_address: "127.0.0.1:8000".into(),
            max_connections: 1,
        };
        listener.set_port(9100);
        assert_eq!(listener.bind_address, "127.0.0.1:9100");
    }

    #[test]
    fn provider_from_str_is_case_insensitive() {
        assert_eq!("GCP".parse::<Provider>().unwrap(), Provider::Gcp);
        assert!("oracle".parse::<Provider>().is_err());
    }
}
