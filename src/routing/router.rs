//! Request routing.
//!
//! # Responsibilities
//! - Parse the volume path of an inbound request
//! - Resolve the volume in the routing table and select an endpoint
//! - Offer the next candidate when a forward attempt fails to connect
//!
//! # Design Decisions
//! - The router owns no routing state; it reads the shared `RoutingTable`
//! - Unknown volumes are an explicit `UnknownVolume`, never a silent default

use std::sync::Arc;

use crate::error::ProxyError;
use crate::load_balancer::endpoint::Endpoint;
use crate::routing::path::VolumePath;
use crate::routing::table::RoutingTable;
use crate::routing::volume::{Selection, SelectionPolicy};

/// A routed request: where it goes and what path it carries.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: VolumePath,
    pub selection: Selection,
}

impl Route {
    pub fn volume_name(&self) -> &str {
        &self.path.name
    }
}

/// Maps request paths to endpoints.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    table: Arc<RoutingTable>,
    policy: SelectionPolicy,
}

impl RequestRouter {
    pub fn new(table: Arc<RoutingTable>, policy: SelectionPolicy) -> Self {
        Self { table, policy }
    }

    /// Route a request path.
    pub fn route(&self, path: &str) -> Result<Route, ProxyError> {
        let path = VolumePath::parse(path)?;
        let selection = self.table.resolve(&path.name, self.policy)?;
        Ok(Route { path, selection })
    }

    /// Next candidate for a retry after `failed` could not be reached.
    pub fn alternate(&self, route: &Route, failed: &Endpoint) -> Option<Arc<Endpoint>> {
        route.selection.volume.alternate(failed, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, Provider, VolumeConfig};

    fn router() -> RequestRouter {
        let table = RoutingTable::from_volumes(&[VolumeConfig {
            name: "etcd-1".into(),
            endpoints: vec![
                EndpointConfig { address: "10.0.0.1:2379".into(), provider: Provider::Aws },
                EndpointConfig { address: "10.0.0.2:2379".into(), provider: Provider::Azure },
            ],
        }])
        .unwrap();
        RequestRouter::new(Arc::new(table), SelectionPolicy::default())
    }

    #[test]
    fn sequential_requests_alternate_endpoints() {
        let router = router();
        let first = router.route("/volume/etcd-1").unwrap();
        let second = router.route("/volume/etcd-1/v3/kv").unwrap();
        assert_ne!(
            first.selection.endpoint.address(),
            second.selection.endpoint.address()
        );
        assert_eq!(second.path.rest, "/v3/kv");
    }

    #[test]
    fn unknown_and_malformed() {
        let router = router();
        assert!(matches!(
            router.route("/volume/does-not-exist").unwrap_err(),
            ProxyError::UnknownVolume { .. }
        ));
        assert!(matches!(
            router.route("/volume/").unwrap_err(),
            ProxyError::MalformedPath { .. }
        ));
    }

    #[test]
    fn alternate_is_the_other_endpoint() {
        let router = router();
        let route = router.route("/volume/etcd-1").unwrap();
        let alt = router.alternate(&route, &route.selection.endpoint).unwrap();
        assert_ne!(alt.address(), route.selection.endpoint.address());
    }
}
