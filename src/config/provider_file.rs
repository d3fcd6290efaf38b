//! Per-provider volume port files.
//!
//! Each provider may ship a `<provider>-proxy.conf` file listing one volume
//! per line as `VOLUME_<NAME>_PORT=<port>`. Other lines (comments, unrelated
//! keys) are ignored. `<NAME>` maps to a volume name by lower-casing and
//! turning `_` into `-`, so `VOLUME_ETCD_1_PORT` names `etcd-1`.
//!
//! Compatibility: the earlier proxy only lower-cased the name, so the same
//! line used to name `etcd_1`. Deployments routing `/volume/etcd_1/...`
//! must switch to `/volume/etcd-1/...` or declare the old name in an
//! explicit `[[volumes]]` entry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::loader::ConfigError;
use crate::config::schema::{EndpointConfig, Provider, ProviderFilesConfig};

const KEY_PREFIX: &str = "VOLUME_";
const KEY_SUFFIX: &str = "_PORT";

/// One `VOLUME_<NAME>_PORT=<port>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub volume: String,
    pub port: u16,
}

/// File name for a provider inside the provider files directory.
pub fn file_name(provider: Provider) -> String {
    format!("{}-proxy.conf", provider)
}

/// Parse the contents of a provider file.
///
/// `path` is only used for error messages.
pub fn parse(path: &Path, content: &str) -> Result<Vec<PortEntry>, ConfigError> {
    let mut entries = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !key.starts_with(KEY_PREFIX) || !key.ends_with(KEY_SUFFIX) {
            continue;
        }

        let error = |message: String| ConfigError::ProviderFile {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };

        let name = key
            .get(KEY_PREFIX.len()..key.len() - KEY_SUFFIX.len())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(error(format!("'{}' does not name a volume", key)));
        }

        let port = value
            .trim()
            .parse::<u16>()
            .map_err(|e| error(format!("invalid port '{}': {}", value.trim(), e)))?;

        entries.push(PortEntry {
            volume: name.to_ascii_lowercase().replace('_', "-"),
            port,
        });
    }

    Ok(entries)
}

/// Load every provider file present in the configured directory.
///
/// Returns `(volume name, endpoint)` pairs in provider order. Missing files
/// are skipped; a missing directory yields nothing.
pub fn load_all(config: &ProviderFilesConfig) -> Result<Vec<(String, EndpointConfig)>, ConfigError> {
    let Some(directory) = &config.directory else {
        return Ok(Vec::new());
    };

    let mut endpoints = Vec::new();
    for provider in Provider::ALL {
        let path: PathBuf = directory.join(file_name(provider));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Provider file not present");
                continue;
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let host = config.host_for(provider);
        let entries = parse(&path, &content)?;
        tracing::debug!(
            provider = %provider,
            path = %path.display(),
            volumes = entries.len(),
            "Loaded provider file"
        );

        for entry in entries {
            endpoints.push((
                entry.volume,
                EndpointConfig {
                    address: format!("{}:{}", host, entry.port),
                    provider,
                },
            ));
        }
    }

    Ok(endpoints)
}
