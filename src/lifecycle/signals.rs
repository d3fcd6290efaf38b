//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT during shutdown forces exit
//! - SIGHUP requests a config reload, not shutdown

use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;

/// Exit code used when a second signal forces shutdown.
const FORCED_EXIT_CODE: i32 = 130;

/// Listen for OS signals until the process exits.
///
/// The first SIGINT/SIGTERM triggers `shutdown`; SIGHUP sends on `reload_tx`.
#[cfg(unix)]
pub async fn listen(shutdown: Shutdown, reload_tx: mpsc::UnboundedSender<()>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    loop {
        let name = tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sighup.recv() => {
                tracing::info!("SIGHUP received, reloading configuration");
                if reload_tx.send(()).is_err() {
                    tracing::warn!("Reload task is not running, SIGHUP ignored");
                }
                continue;
            }
        };
        on_terminate(&shutdown, name);
    }
}

#[cfg(not(unix))]
pub async fn listen(shutdown: Shutdown, _reload_tx: mpsc::UnboundedSender<()>) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        on_terminate(&shutdown, "Ctrl+C");
    }
}

fn on_terminate(shutdown: &Shutdown, name: &str) {
    if shutdown.is_triggered() {
        tracing::warn!(signal = name, "Second shutdown signal, forcing exit");
        std::process::exit(FORCED_EXIT_CODE);
    }
    tracing::info!(signal = name, "Shutdown signal received");
    shutdown.trigger();
}
