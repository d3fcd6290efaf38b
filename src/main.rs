//! Volume-aware reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                    VOLUME PROXY                      │
//!                              │                                                      │
//!     Client Request           │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ─────────────────────────┼─▶│   net   │───▶│  http   │───▶│   routing    │      │
//!                              │  │listener │    │ server  │    │    table     │      │
//!                              │  └─────────┘    └─────────┘    └──────┬───────┘      │
//!                              │                                       ▼              │
//!                              │                               ┌──────────────┐       │
//!                              │                               │load_balancer │       │
//!                              │                               │ round robin  │       │
//!                              │                               └──────┬───────┘       │
//!                              │                                       ▼              │
//!     Client Response          │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ◀────────────────────────┼──│response │◀───│ forward │◀───│   endpoint   │◀─────┼──── Volume
//!                              │  │ stream  │    │ session │    │  connection  │      │     Backend
//!                              │  └─────────┘    └─────────┘    └──────────────┘      │
//!                              │                                                      │
//!                              │  config · health · observability · resilience ·      │
//!                              │  admin reload · lifecycle                            │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use volume_proxy::lifecycle::startup::{self, StartupOptions};
use volume_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "volume-proxy")]
#[command(about = "Volume-aware reverse proxy for multi-cloud storage endpoints", long_about = None)]
struct Cli {
    /// Listen port; overrides the port of `listener.bind_address`.
    port: Option<u16>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not watch the configuration file for changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = StartupOptions {
        config_path: cli.config,
        port: cli.port,
        watch: !cli.no_watch,
    };

    match startup::run(options).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // No-op if startup already installed the subscriber
            logging::init_logging("info");
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
