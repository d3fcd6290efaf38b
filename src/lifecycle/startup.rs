//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Start background tasks (health checks, signals, config reload)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds after the routing table exists, so the first
//!   request already sees every configured volume

use std::net::SocketAddr;
use std::path::PathBuf;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::admin::Reloader;
use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, ConfigError, ProxyConfig};
use crate::http::ProxyServer;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::lifecycle::signals;
use crate::net::{Listener, ListenerError};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Process parameters from the command line.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub config_path: Option<PathBuf>,
    /// Overrides the port of `listener.bind_address`.
    pub port: Option<u16>,
    /// Watch the config file for changes.
    pub watch: bool,
}

/// Load the configuration named by `options`, applying the port override.
pub fn load(options: &StartupOptions) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = options.port {
        config.listener.set_port(port);
    }
    Ok(config)
}

/// Start the proxy and serve until shutdown.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    // 1. Configuration
    let config = load(&options)?;

    // 2. Logging
    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?options.config_path,
        "Starting volume proxy"
    );

    // 3. Metrics
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    // 4. Routing table
    let server = ProxyServer::new(config.clone(), options.config_path.clone())?;

    // 5. Listener
    let listener = Listener::bind(&config.listener).await?;

    // 6. Background tasks
    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = signals::listen(shutdown, reload_tx).await {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        }
    });

    // The watcher handle must stay alive while serving
    let (_watcher, updates) = match (&options.config_path, options.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(updates))
        }
        _ => (None, None),
    };

    tokio::spawn(reload_loop(
        server.reloader().clone(),
        reload_rx,
        updates,
        shutdown.subscribe(),
    ));

    // 7. Serve
    server.run(listener, shutdown).await;
    Ok(())
}

/// Apply reload requests from SIGHUP and the config watcher.
async fn reload_loop(
    reloader: Reloader,
    mut signals: mpsc::UnboundedReceiver<()>,
    mut updates: Option<mpsc::UnboundedReceiver<ProxyConfig>>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            Some(()) = signals.recv() => {
                let _ = reloader.reload("sighup");
            }
            Some(config) = next_update(&mut updates) => {
                let _ = reloader.apply(&config, "watcher");
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn next_update(updates: &mut Option<mpsc::UnboundedReceiver<ProxyConfig>>) -> Option<ProxyConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_override_keeps_host() {
        let options = StartupOptions {
            port: Some(9100),
            ..StartupOptions::default()
        };
        let config = load(&options).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9100");
    }

    #[test]
    fn missing_config_file_fails() {
        let options = StartupOptions {
            config_path: Some(PathBuf::from("/nonexistent/volume-proxy.toml")),
            ..StartupOptions::default()
        };
        assert!(matches!(load(&options), Err(ConfigError::Io { .. })));
    }
}
