//! Routing table reloads.
//!
//! The file watcher, `SIGHUP`, and `POST /admin/reload` all end up here, so
//! every trigger applies a new configuration the same way: resolve the
//! volume set (inline plus provider files), then one `replace_all` swap. A
//! failed reload leaves the running table untouched.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::{load_config, resolve_volumes, ConfigError, ProxyConfig, ValidationError};
use crate::routing::{ReloadSummary, RoutingTable};

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("no configuration file to reload from")]
    NoConfigFile,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IntoResponse for ReloadError {
    fn into_response(self) -> Response {
        let status = match self {
            ReloadError::NoConfigFile => StatusCode::CONFLICT,
            ReloadError::Config(ConfigError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ReloadError::Config(_) | ReloadError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = json!({
            "error": "reload_failed",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Applies configuration revisions to the routing table.
#[derive(Debug, Clone)]
pub struct Reloader {
    config_path: Option<PathBuf>,
    table: Arc<RoutingTable>,
}

impl Reloader {
    pub fn new(config_path: Option<PathBuf>, table: Arc<RoutingTable>) -> Self {
        Self { config_path, table }
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Re-read the configuration file and apply it.
    pub fn reload(&self, trigger: &str) -> Result<ReloadSummary, ReloadError> {
        let path = self.config_path.as_ref().ok_or(ReloadError::NoConfigFile)?;
        let result = load_config(path)
            .map_err(ReloadError::from)
            .and_then(|config| self.apply_inner(&config));
        self.log(trigger, &result);
        result
    }

    /// Apply an already loaded configuration.
    pub fn apply(&self, config: &ProxyConfig, trigger: &str) -> Result<ReloadSummary, ReloadError> {
        let result = self.apply_inner(config);
        self.log(trigger, &result);
        result
    }

    fn apply_inner(&self, config: &ProxyConfig) -> Result<ReloadSummary, ReloadError> {
        let volumes = resolve_volumes(config)?;
        Ok(self.table.replace_all(&volumes)?)
    }

    fn log(&self, trigger: &str, result: &Result<ReloadSummary, ReloadError>) {
        match result {
            Ok(summary) if summary.is_noop() => {
                tracing::info!(trigger, volumes = summary.volumes, "Configuration reloaded, no volume changes");
            }
            Ok(summary) => tracing::info!(
                trigger,
                volumes = summary.volumes,
                added = ?summary.added,
                removed = ?summary.removed,
                updated = ?summary.updated,
                "Configuration reloaded"
            ),
            Err(e) => tracing::error!(
                trigger,
                error = %e,
                "Failed to reload config, keeping current routing table"
            ),
        }
    }
}
