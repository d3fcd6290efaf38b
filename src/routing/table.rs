//! The routing table: volume name → volume.
//!
//! # Responsibilities
//! - Resolve a volume name and select an endpoint
//! - Replace volumes atomically (single entry or the whole set on reload)
//! - Apply health probe results
//! - Produce read-only snapshots for status reporting
//!
//! # Design Decisions
//! - Readers load an `Arc` of the whole map through `ArcSwap`; no read locks
//! - Every mutation goes through one writer mutex, so writes are serialized
//! - Volumes are never edited in place: a change builds a new `Volume` and
//!   swaps a new map in, so readers see either the old or the new entry
//! - Endpoint health is the one per-endpoint atomic the table updates, and
//!   only through `apply_probe`

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::validation::{parse_authority, ValidationError};
use crate::config::{Provider, VolumeConfig};
use crate::error::ProxyError;
use crate::health::state::{HealthPolicy, ProbeOutcome, Transition};
use crate::load_balancer::endpoint::{Endpoint, HealthState};
use crate::routing::volume::{Selection, SelectionPolicy, Volume, VolumeHealth};

type VolumeMap = HashMap<String, Arc<Volume>>;

/// Authoritative mapping from volume name to its endpoints.
#[derive(Debug)]
pub struct RoutingTable {
    volumes: ArcSwap<VolumeMap>,
    write_lock: Mutex<()>,
    initialized: AtomicBool,
}

/// Volume names affected by a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Volume count after the reload.
    pub volumes: usize,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Read-only view of the table at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub providers: BTreeSet<Provider>,
    pub volumes: BTreeMap<String, VolumeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeSnapshot {
    /// Provider of the first (primary) endpoint.
    pub provider: Option<Provider>,
    pub health: VolumeHealth,
    pub endpoints: Vec<EndpointSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSnapshot {
    pub address: String,
    pub provider: Provider,
    pub health: HealthState,
    pub last_probe: Option<DateTime<Utc>>,
    pub last_healthy: Option<DateTime<Utc>>,
    pub active_sessions: usize,
}

/// A probe result as recorded in the table.
#[derive(Debug, Clone)]
pub struct AppliedProbe {
    /// The live endpoint the result was recorded on.
    pub endpoint: Arc<Endpoint>,
    pub transition: Option<Transition>,
}

impl RoutingTable {
    /// Create an empty, uninitialized table.
    pub fn new() -> Self {
        Self {
            volumes: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Build an initialized table from volume definitions.
    pub fn from_volumes(volumes: &[VolumeConfig]) -> Result<Self, ValidationError> {
        let table = Self::new();
        table.replace_all(volumes)?;
        Ok(table)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the table has been loaded at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.volumes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a volume.
    pub fn volume(&self, name: &str) -> Option<Arc<Volume>> {
        self.volumes.load().get(name).cloned()
    }

    /// Resolve a volume and select an endpoint for it.
    pub fn resolve(&self, name: &str, policy: SelectionPolicy) -> Result<Selection, ProxyError> {
        let volume = self.volume(name).ok_or_else(|| ProxyError::UnknownVolume {
            name: name.to_string(),
        })?;
        volume.select(policy)
    }

    /// Register or atomically replace one volume.
    ///
    /// Endpoints that already existed for the volume keep their health.
    pub fn update(&self, name: &str, endpoints: Vec<Endpoint>) {
        let _guard = self.lock();
        let current = self.volumes.load_full();

        let endpoints: Vec<Arc<Endpoint>> = endpoints.into_iter().map(Arc::new).collect();
        carry_over_health(current.get(name).map(Arc::as_ref), &endpoints);

        let mut next = VolumeMap::clone(&current);
        next.insert(name.to_string(), Arc::new(Volume::new(name, endpoints)));
        self.volumes.store(Arc::new(next));
        self.initialized.store(true, Ordering::Release);

        tracing::info!(volume = %name, "Volume updated");
    }

    /// Deregister a volume. Returns false if it was not present.
    pub fn remove(&self, name: &str) -> bool {
        let _guard = self.lock();
        let current = self.volumes.load_full();
        if !current.contains_key(name) {
            return false;
        }

        let mut next = VolumeMap::clone(&current);
        next.remove(name);
        self.volumes.store(Arc::new(next));
        tracing::info!(volume = %name, "Volume removed");
        true
    }

    /// Replace the whole volume set in one swap.
    ///
    /// Every new entry is built before anything is published, so an invalid
    /// address leaves the table untouched. Volumes whose endpoint list is
    /// unchanged keep their `Volume` (and its round-robin cursor).
    pub fn replace_all(&self, volumes: &[VolumeConfig]) -> Result<ReloadSummary, ValidationError> {
        let _guard = self.lock();
        let current = self.volumes.load_full();

        let mut next = VolumeMap::with_capacity(volumes.len());
        let mut summary = ReloadSummary::default();

        for config in volumes {
            let endpoints = build_endpoints(config)?;
            let previous = current.get(&config.name);

            let volume = match previous {
                Some(existing) if existing.same_targets(&endpoints) => existing.clone(),
                Some(existing) => {
                    carry_over_health(Some(existing), &endpoints);
                    summary.updated.push(config.name.clone());
                    Arc::new(Volume::new(&config.name, endpoints))
                }
                None => {
                    summary.added.push(config.name.clone());
                    Arc::new(Volume::new(&config.name, endpoints))
                }
            };
            next.insert(config.name.clone(), volume);
        }

        summary.removed = current
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        summary.added.sort();
        summary.removed.sort();
        summary.updated.sort();
        summary.volumes = next.len();

        self.volumes.store(Arc::new(next));
        self.initialized.store(true, Ordering::Release);
        Ok(summary)
    }

    /// Every endpoint with the volume it belongs to, for probing.
    pub fn endpoints(&self) -> Vec<(String, Arc<Endpoint>)> {
        self.volumes
            .load()
            .values()
            .flat_map(|v| {
                v.endpoints()
                    .iter()
                    .map(move |e| (v.name().to_string(), e.clone()))
            })
            .collect()
    }

    /// Apply a probe result for `endpoint` of `volume`.
    ///
    /// This is the only path that changes endpoint health. The result lands
    /// on the endpoint currently in the table with the same target, so a
    /// reload between probing and applying does not lose it. Returns `None`
    /// if the endpoint has since been removed.
    pub fn apply_probe(
        &self,
        volume: &str,
        endpoint: &Endpoint,
        outcome: ProbeOutcome,
        policy: &HealthPolicy,
    ) -> Option<AppliedProbe> {
        let _guard = self.lock();
        let current = self
            .volumes
            .load()
            .get(volume)?
            .endpoints()
            .iter()
            .find(|e| e.same_target(endpoint))?
            .clone();
        let transition = current.record_probe(outcome, policy, Utc::now());
        Some(AppliedProbe {
            endpoint: current,
            transition,
        })
    }

    /// Consistent read-only view for status reporting.
    pub fn snapshot(&self) -> TableSnapshot {
        let map = self.volumes.load_full();
        let mut providers = BTreeSet::new();
        let mut volumes = BTreeMap::new();

        for (name, volume) in map.iter() {
            let endpoints: Vec<EndpointSnapshot> = volume
                .endpoints()
                .iter()
                .map(|e| EndpointSnapshot {
                    address: e.address().to_string(),
                    provider: e.provider(),
                    health: e.health(),
                    last_probe: e.last_probe(),
                    last_healthy: e.last_healthy(),
                    active_sessions: e.active_sessions(),
                })
                .collect();
            providers.extend(endpoints.iter().map(|e| e.provider));

            volumes.insert(
                name.clone(),
                VolumeSnapshot {
                    provider: endpoints.first().map(|e| e.provider),
                    health: volume.health(),
                    endpoints,
                },
            );
        }

        TableSnapshot { providers, volumes }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

fn build_endpoints(config: &VolumeConfig) -> Result<Vec<Arc<Endpoint>>, ValidationError> {
    config
        .endpoints
        .iter()
        .map(|e| {
            let authority = parse_authority(&e.address).ok_or_else(|| {
                ValidationError::InvalidEndpointAddress {
                    volume: config.name.clone(),
                    address: e.address.clone(),
                }
            })?;
            Ok(Arc::new(Endpoint::new(authority, e.provider)))
        })
        .collect()
}

fn carry_over_health(previous: Option<&Volume>, endpoints: &[Arc<Endpoint>]) {
    let Some(previous) = previous else {
        return;
    };
    for endpoint in endpoints {
        if let Some(old) = previous.endpoints().iter().find(|o| o.same_target(endpoint)) {
            endpoint.inherit_health(old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use axum::http::uri::Authority;

    fn config(name: &str, endpoints: &[(&str, Provider)]) -> VolumeConfig {
        VolumeConfig {
            name: name.into(),
            endpoints: endpoints
                .iter()
                .map(|(a, p)| EndpointConfig { address: a.to_string(), provider: *p })
                .collect(),
        }
    }

    fn etcd_table() -> RoutingTable {
        RoutingTable::from_volumes(&[config(
            "etcd-1",
            &[("10.0.0.1:2379", Provider::Aws), ("10.0.0.2:2379", Provider::Azure)],
        )])
        .unwrap()
    }

    #[test]
    fn new_table_is_uninitialized() {
        let table = RoutingTable::new();
        assert!(!table.is_initialized());
        assert!(table.is_empty());
        assert!(etcd_table().is_initialized());
    }

    #[test]
    fn resolve_round_robins() {
        let table = etcd_table();
        let policy = SelectionPolicy::default();
        let first = table.resolve("etcd-1", policy).unwrap();
        let second = table.resolve("etcd-1", policy).unwrap();
        assert_eq!(first.endpoint.address(), "10.0.0.1:2379");
        assert_eq!(second.endpoint.address(), "10.0.0.2:2379");
        assert!(!first.degraded && !second.degraded);
    }

    #[test]
    fn resolve_unknown_volume() {
        let err = etcd_table()
            .resolve("does-not-exist", SelectionPolicy::default())
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnknownVolume { name } if name == "does-not-exist"));
    }

    #[test]
    fn update_and_remove() {
        let table = etcd_table();
        table.update(
            "etcd-2",
            vec![Endpoint::new(Authority::from_static("10.0.0.9:2379"), Provider::Ibm)],
        );
        assert_eq!(table.len(), 2);
        assert!(table.remove("etcd-2"));
        assert!(!table.remove("etcd-2"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_all_reports_changes_and_keeps_health() {
        let table = etcd_table();
        let policy = HealthPolicy::new(1);
        let aws = table.volume("etcd-1").unwrap().endpoints()[0].clone();
        table.apply_probe("etcd-1", &aws, ProbeOutcome::Failure, &policy);

        let summary = table
            .replace_all(&[
                config(
                    "etcd-1",
                    &[("10.0.0.1:2379", Provider::Aws), ("10.0.0.3:2379", Provider::Gcp)],
                ),
                config("etcd-2", &[("10.0.0.4:2379", Provider::Ibm)]),
            ])
            .unwrap();

        assert_eq!(summary.added, vec!["etcd-2".to_string()]);
        assert_eq!(summary.updated, vec!["etcd-1".to_string()]);
        assert!(summary.removed.is_empty());
        assert_eq!(summary.volumes, 2);

        let volume = table.volume("etcd-1").unwrap();
        assert_eq!(volume.endpoints()[0].health(), HealthState::Unhealthy);
        assert_eq!(volume.endpoints()[1].health(), HealthState::Unknown);

        let summary = table.replace_all(&[config("etcd-2", &[("10.0.0.4:2379", Provider::Ibm)])]).unwrap();
        assert_eq!(summary.removed, vec!["etcd-1".to_string()]);
        assert!(summary.added.is_empty() && summary.updated.is_empty());
    }

    #[test]
    fn probe_result_follows_endpoint_across_reload() {
        let table = etcd_table();
        let policy = HealthPolicy::new(1);
        let probed = table.endpoints();

        table
            .replace_all(&[config(
                "etcd-1",
                &[
                    ("10.0.0.1:2379", Provider::Aws),
                    ("10.0.0.2:2379", Provider::Azure),
                    ("10.0.0.3:2379", Provider::Gcp),
                ],
            )])
            .unwrap();

        let (volume, stale) = probed
            .iter()
            .find(|(_, e)| e.address() == "10.0.0.1:2379")
            .unwrap();
        let applied = table
            .apply_probe(volume, stale, ProbeOutcome::Failure, &policy)
            .unwrap();
        assert!(!Arc::ptr_eq(&applied.endpoint, stale));
        assert_eq!(applied.transition.map(|t| t.to), Some(HealthState::Unhealthy));

        let live = table.volume("etcd-1").unwrap().endpoints()[0].clone();
        assert!(Arc::ptr_eq(&applied.endpoint, &live));
        assert_eq!(live.health(), HealthState::Unhealthy);
        assert_eq!(stale.health(), HealthState::Unknown);
    }

    #[test]
    fn probe_for_removed_endpoint_is_dropped() {
        let table = etcd_table();
        let probed = table.endpoints();
        table
            .replace_all(&[config("etcd-1", &[("10.0.0.2:2379", Provider::Azure)])])
            .unwrap();

        let (volume, gone) = probed
            .iter()
            .find(|(_, e)| e.address() == "10.0.0.1:2379")
            .unwrap();
        assert!(table
            .apply_probe(volume, gone, ProbeOutcome::Failure, &HealthPolicy::new(1))
            .is_none());
    }

    #[test]
    fn replace_all_rejects_bad_address_without_swapping() {
        let table = etcd_table();
        let err = table
            .replace_all(&[config("etcd-9", &[("nope", Provider::Aws)])])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEndpointAddress { .. }));
        assert!(table.volume("etcd-1").is_some());
        assert!(table.volume("etcd-9").is_none());
    }

    #[test]
    fn snapshot_reports_providers_and_health() {
        let snapshot = etcd_table().snapshot();
        assert_eq!(
            snapshot.providers.iter().copied().collect::<Vec<_>>(),
            vec![Provider::Aws, Provider::Azure]
        );
        let volume = &snapshot.volumes["etcd-1"];
        assert_eq!(volume.provider, Some(Provider::Aws));
        assert_eq!(volume.health, VolumeHealth::Unknown);
        assert_eq!(volume.endpoints.len(), 2);
        assert!(volume.endpoints[0].last_healthy.is_none());
    }

    #[test]
    fn concurrent_snapshots_never_see_partial_volume() {
        let set_a = config(
            "etcd-1",
            &[("10.0.0.1:2379", Provider::Aws), ("10.0.0.2:2379", Provider::Azure)],
        );
        let set_b = config(
            "etcd-1",
            &[
                ("10.1.0.1:2379", Provider::Gcp),
                ("10.1.0.2:2379", Provider::Ibm),
                ("10.1.0.3:2379", Provider::Digitalocean),
            ],
        );
        let addresses = |c: &VolumeConfig| -> Vec<String> {
            c.endpoints.iter().map(|e| e.address.clone()).collect()
        };
        let (expected_a, expected_b) = (addresses(&set_a), addresses(&set_b));

        let table = Arc::new(RoutingTable::from_volumes(std::slice::from_ref(&set_a)).unwrap());

        let writer = {
            let table = table.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let next = if i % 2 == 0 { &set_b } else { &set_a };
                    table.replace_all(std::slice::from_ref(next)).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                let (a, b) = (expected_a.clone(), expected_b.clone());
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = table.snapshot();
                        let seen: Vec<String> = snapshot.volumes["etcd-1"]
                            .endpoints
                            .iter()
                            .map(|e| e.address.clone())
                            .collect();
                        assert!(seen == a || seen == b, "partial volume observed: {seen:?}");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
