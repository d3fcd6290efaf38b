//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy's route table
//! - Wire up middleware (request ID, tracing)
//! - Run the accept loop on a bounded `Listener`
//! - Serve each connection with HTTP/1.1 and h2c auto-detection
//! - Spawn the health monitor
//! - Drain connections on shutdown
//!
//! # Design Decisions
//! - Connections are served directly through hyper-util so each one can be
//!   tracked and told to shut down gracefully
//! - The peer address is attached as `ConnectInfo` before axum sees the
//!   request

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ConnectInfo,
    http::Request,
    routing::{get, MethodRouter},
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{self, Reloader};
use crate::config::{resolve_volumes, ConfigError, ProxyConfig};
use crate::health::HealthMonitor;
use crate::http::forward::Forwarder;
use crate::http::handlers;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::routing::{RequestRouter, RoutingTable, SelectionPolicy};

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub table: Arc<RoutingTable>,
    pub router: RequestRouter,
    pub forwarder: Arc<Forwarder>,
    pub reloader: Reloader,
}

/// The volume proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    state: AppState,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Build the server and its routing table from configuration.
    ///
    /// `config_path` is where reloads read from; without it reloads fail
    /// with a conflict.
    pub fn new(config: ProxyConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let volumes = resolve_volumes(&config)?;
        let table = Arc::new(
            RoutingTable::from_volumes(&volumes).map_err(|e| ConfigError::Validation(vec![e]))?,
        );
        tracing::info!(volumes = table.len(), "Routing table initialized");

        let policy = SelectionPolicy {
            fail_fast: config.routing.fail_fast,
        };
        let state = AppState {
            table: table.clone(),
            router: RequestRouter::new(table.clone(), policy),
            forwarder: Arc::new(Forwarder::new(&config.timeouts, &config.limits)),
            reloader: Reloader::new(config_path, table),
        };

        Ok(Self {
            config,
            state,
            tracker: ConnectionTracker::new(),
        })
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.state.table
    }

    pub fn reloader(&self) -> &Reloader {
        &self.state.reloader
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` fires, then drain open connections.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server listening");
        }

        let monitor = HealthMonitor::new(self.state.table.clone(), self.config.health_check.clone());
        let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

        let app = self.router();
        let mut signal = shutdown.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            app.clone(),
                            permit,
                            guard,
                            shutdown.subscribe(),
                        ));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = signal.recv() => break,
            }
        }

        drop(listener);
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tracing::info!(
            open_connections = self.tracker.active_count(),
            grace_secs = grace.as_secs(),
            "Stopped accepting, draining connections"
        );
        if self.tracker.wait_for_drain(grace).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                open_connections = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            );
        }

        let _ = monitor_task.await;
        tracing::info!("Proxy server stopped");
    }
}

fn volume_route() -> MethodRouter<AppState> {
    get(handlers::proxy_volume)
        .post(handlers::proxy_volume)
        .put(handlers::proxy_volume)
        .delete(handlers::proxy_volume)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .route("/volume", volume_route())
        .route("/volume/", volume_route())
        .route("/volume/{*rest}", volume_route())
        .merge(admin::admin_router())
        .fallback(handlers::fallback)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    _permit: ConnectionPermit,
    mut guard: ConnectionGuard,
    mut shutdown: ShutdownSignal,
) {
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            guard.mark_draining();
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
    }
}
