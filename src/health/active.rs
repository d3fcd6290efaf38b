//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every endpoint in the routing table
//! - Feed results through the table so health changes are serialized
//! - Log state transitions and publish the health gauge

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::Prober;
use crate::health::state::{HealthPolicy, Transition};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::load_balancer::endpoint::{Endpoint, HealthState};
use crate::observability::metrics;
use crate::routing::RoutingTable;

pub struct HealthMonitor {
    table: Arc<RoutingTable>,
    config: HealthCheckConfig,
    policy: HealthPolicy,
    prober: Prober,
}

impl HealthMonitor {
    pub fn new(table: Arc<RoutingTable>, config: HealthCheckConfig) -> Self {
        let prober = Prober::new(&config);
        let policy = HealthPolicy::new(config.unhealthy_threshold);
        Self {
            table,
            config,
            policy,
            prober,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            probe = ?self.config.probe,
            unhealthy_threshold = self.policy.unhealthy_threshold(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        // A slow round delays the next one instead of bunching probes up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one probe round over every endpoint.
    pub async fn check_all(&self) {
        let endpoints = self.table.endpoints();
        if endpoints.is_empty() {
            return;
        }

        let probes = endpoints.iter().map(|(_, endpoint)| self.prober.probe(endpoint));
        let outcomes = join_all(probes).await;

        for ((volume, endpoint), outcome) in endpoints.iter().zip(outcomes) {
            // Removed by a reload while the probe was in flight
            let Some(applied) = self.table.apply_probe(volume, endpoint, outcome, &self.policy) else {
                continue;
            };
            let current = &applied.endpoint;
            if let Some(transition) = applied.transition {
                log_transition(volume, current, transition);
            }
            metrics::record_endpoint_health(
                current.address(),
                current.provider().as_str(),
                current.is_routable(),
            );
        }
    }
}

fn log_transition(volume: &str, endpoint: &Endpoint, transition: Transition) {
    match transition.to {
        HealthState::Unhealthy => tracing::warn!(
            volume = %volume,
            endpoint = %endpoint.address(),
            provider = %endpoint.provider(),
            failures = endpoint.consecutive_failures(),
            from = %transition.from,
            "Endpoint marked unhealthy"
        ),
        HealthState::Healthy if transition.from == HealthState::Unhealthy => tracing::info!(
            volume = %volume,
            endpoint = %endpoint.address(),
            provider = %endpoint.provider(),
            "Endpoint recovered"
        ),
        _ => tracing::debug!(
            volume = %volume,
            endpoint = %endpoint.address(),
            from = %transition.from,
            to = %transition.to,
            "Endpoint health changed"
        ),
    }
}
