//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Check volume names and endpoint addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: config in, `Result<(), Vec<ValidationError>>` out
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{ProxyConfig, VolumeConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("volume name must not be empty")]
    EmptyVolumeName,

    #[error("volume name '{0}' must not contain '/'")]
    InvalidVolumeName(String),

    #[error("volume '{0}' is declared more than once")]
    DuplicateVolume(String),

    #[error("endpoint '{address}' of volume '{volume}' is not a host:port address")]
    InvalidEndpointAddress { volume: String, address: String },
}

/// Validate the static sections of a configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let positive: [(&'static str, u64); 6] = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("health_check.unhealthy_threshold", config.health_check.unhealthy_threshold as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::MustBePositive { field });
        }
    }

    if let Err(mut volume_errors) = validate_volumes(&config.volumes) {
        errors.append(&mut volume_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a set of volume definitions (inline or merged from provider files).
pub fn validate_volumes(volumes: &[VolumeConfig]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for volume in volumes {
        if volume.name.is_empty() {
            errors.push(ValidationError::EmptyVolumeName);
        } else if volume.name.contains('/') {
            errors.push(ValidationError::InvalidVolumeName(volume.name.clone()));
        } else if !seen.insert(volume.name.as_str()) {
            errors.push(ValidationError::DuplicateVolume(volume.name.clone()));
        }

        for endpoint in &volume.endpoints {
            if parse_authority(&endpoint.address).is_none() {
                errors.push(ValidationError::InvalidEndpointAddress {
                    volume: volume.name.clone(),
                    address: endpoint.address.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse `host:port` into a URI authority. The port is mandatory.
pub fn parse_authority(address: &str) -> Option<Authority> {
    let authority: Authority = address.parse().ok()?;
    if authority.port_u16().is_none() || authority.host().is_empty() || address.contains('@') {
        return None;
    }
    Some(authority)
}
