//! Load-balanced routing pipeline
//!
//! snapshot -> enumerate -> drop non-viable -> bottleneck cost -> select

use crate::cost::{score_routes, ScoredPath};
use crate::search::{find_all_routes, SearchLimits};
use crate::selector::PathSelector;
use crate::topology::{HostService, TopologyGraph, TopologyService};
use crate::weight::LinkWeigher;
use lbr_common::{DeviceId, ElementId, Timestamp};
use std::sync::Arc;

/// Load-balanced path queries
///
/// Results hold at most one path; an empty result means no usable path.
pub trait RoutingService: Send + Sync {
    /// Best path over the current topology
    fn load_balance_paths(&self, src: &ElementId, dst: &ElementId) -> Vec<ScoredPath>;

    /// Best path over a caller-supplied snapshot
    fn load_balance_paths_in(
        &self,
        topology: &TopologyGraph,
        src: &ElementId,
        dst: &ElementId,
    ) -> Vec<ScoredPath>;
}

/// Congestion-aware routing over topology snapshots
pub struct LoadBalanceRouting {
    topology: Arc<dyn TopologyService>,
    hosts: Option<Arc<dyn HostService>>,
    weigher: Arc<dyn LinkWeigher>,
    selector: PathSelector,
    limits: SearchLimits,
}

impl LoadBalanceRouting {
    /// Create with default selector and search limits
    pub fn new(topology: Arc<dyn TopologyService>, weigher: Arc<dyn LinkWeigher>) -> Self {
        Self {
            topology,
            hosts: None,
            weigher,
            selector: PathSelector::new(),
            limits: SearchLimits::default(),
        }
    }

    /// Resolve host endpoints through a host service
    pub fn with_hosts(mut self, hosts: Arc<dyn HostService>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    /// Set path selector
    pub fn with_selector(mut self, selector: PathSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set search limits
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Best path between two devices, if any
    pub fn select_path(&self, topology: &TopologyGraph, src: &DeviceId, dst: &DeviceId) -> Option<ScoredPath> {
        let start = Timestamp::now();

        let mut routes = find_all_routes(topology, src, dst, self.limits);
        let enumerated = routes.len();
        routes.retain(|route| route.iter().all(|link| self.weigher.is_viable(link)));

        let scored = score_routes(self.weigher.as_ref(), routes);
        let viable = scored.len();
        let selected = self.selector.select_one(scored);

        tracing::debug!(
            %src,
            %dst,
            enumerated,
            viable,
            cost = selected.as_ref().map(ScoredPath::cost),
            elapsed_us = start.elapsed_micros(),
            "path computation finished"
        );
        selected
    }

    /// Device an element is reached through
    fn resolve(&self, element: &ElementId) -> Option<DeviceId> {
        match element {
            ElementId::Device(device) => Some(device.clone()),
            ElementId::Host(host) => {
                let location = self.hosts.as_ref()?.host_location(host);
                if location.is_none() {
                    tracing::debug!(%host, "host location unknown");
                }
                location.map(|cp| cp.device)
            }
        }
    }
}

impl RoutingService for LoadBalanceRouting {
    fn load_balance_paths(&self, src: &ElementId, dst: &ElementId) -> Vec<ScoredPath> {
        match self.topology.current_topology() {
            Ok(topology) => self.load_balance_paths_in(&topology, src, dst),
            Err(e) => {
                tracing::error!(error = %e, "cannot read topology, no path available");
                Vec::new()
            }
        }
    }

    fn load_balance_paths_in(
        &self,
        topology: &TopologyGraph,
        src: &ElementId,
        dst: &ElementId,
    ) -> Vec<ScoredPath> {
        let (Some(src), Some(dst)) = (self.resolve(src), self.resolve(dst)) else {
            return Vec::new();
        };
        self.select_path(topology, &src, &dst).into_iter().collect()
    }
}
