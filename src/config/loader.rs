//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::provider_file;
use crate::config::schema::{ProxyConfig, VolumeConfig};
use crate::config::validation::{validate_config, validate_volumes, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{}:{line}: {message}", .path.display())]
    ProviderFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the full volume list: inline `[[volumes]]` first, then provider
/// files in provider order. Volumes named by several sources merge their
/// endpoint lists.
pub fn resolve_volumes(config: &ProxyConfig) -> Result<Vec<VolumeConfig>, ConfigError> {
    let mut volumes = config.volumes.clone();

    for (name, endpoint) in provider_file::load_all(&config.provider_files)? {
        match volumes.iter_mut().find(|v| v.name == name) {
            Some(volume) => {
                if !volume.endpoints.contains(&endpoint) {
                    volume.endpoints.push(endpoint);
                }
            }
            None => volumes.push(VolumeConfig {
                name,
                endpoints: vec![endpoint],
            }),
        }
    }

    validate_volumes(&volumes).map_err(ConfigError::Validation)?;
    Ok(volumes)
}
