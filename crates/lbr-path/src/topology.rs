//! Topology snapshots and the accessors the engine reads them through

use arc_swap::ArcSwap;
use dashmap::DashMap;
use lbr_common::{ConnectPoint, DeviceId, HostId, RoutingResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Operational state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Link is up
    Active,
    /// Link is down
    Inactive,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::Active
    }
}

/// Directed infrastructure link
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Egress port
    pub src: ConnectPoint,
    /// Ingress port
    pub dst: ConnectPoint,
    /// Operational state
    #[serde(default)]
    pub state: LinkState,
    /// Free-form annotations (e.g. `metric`)
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Link {
    /// Create an active link without annotations
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self {
            src,
            dst,
            state: LinkState::Active,
            annotations: BTreeMap::new(),
        }
    }

    /// Set state
    pub fn with_state(mut self, state: LinkState) -> Self {
        self.state = state;
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Whether the link is up
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LinkState::Active
    }

    /// Look up an annotation
    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations.get(name).map(String::as_str)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Immutable topology graph: devices plus outgoing links per device
#[derive(Debug, Default)]
pub struct TopologyGraph {
    vertices: BTreeSet<DeviceId>,
    edges_from: HashMap<DeviceId, Vec<Arc<Link>>>,
    link_count: usize,
}

impl TopologyGraph {
    /// Build a graph; link endpoints are added as vertices
    pub fn new(
        devices: impl IntoIterator<Item = DeviceId>,
        links: impl IntoIterator<Item = Link>,
    ) -> Self {
        let mut graph = Self {
            vertices: devices.into_iter().collect(),
            ..Self::default()
        };
        for link in links {
            graph.vertices.insert(link.src.device.clone());
            graph.vertices.insert(link.dst.device.clone());
            graph
                .edges_from
                .entry(link.src.device.clone())
                .or_default()
                .push(Arc::new(link));
            graph.link_count += 1;
        }
        graph
    }

    /// Build a graph from links alone
    pub fn from_links(links: impl IntoIterator<Item = Link>) -> Self {
        Self::new(std::iter::empty(), links)
    }

    /// All devices
    pub fn vertices(&self) -> impl Iterator<Item = &DeviceId> {
        self.vertices.iter()
    }

    /// Whether the device is part of the snapshot
    pub fn contains(&self, device: &DeviceId) -> bool {
        self.vertices.contains(device)
    }

    /// Outgoing links of a device
    pub fn edges_from(&self, device: &DeviceId) -> &[Arc<Link>] {
        self.edges_from
            .get(device)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of devices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of directed links
    pub fn link_count(&self) -> usize {
        self.link_count
    }
}

/// Read access to the current topology
pub trait TopologyService: Send + Sync {
    /// Snapshot valid for the duration of one computation
    ///
    /// Providers that cannot express their topology as a [`TopologyGraph`]
    /// return `RoutingError::UnsupportedTopologyRepresentation`.
    fn current_topology(&self) -> RoutingResult<Arc<TopologyGraph>>;
}

/// Topology holder with lock-free snapshot publication
pub struct InMemoryTopology {
    current: ArcSwap<TopologyGraph>,
}

impl InMemoryTopology {
    /// Create with an initial snapshot
    pub fn new(graph: TopologyGraph) -> Self {
        Self {
            current: ArcSwap::from_pointee(graph),
        }
    }

    /// Replace the snapshot; in-flight readers keep the previous one
    pub fn publish(&self, graph: TopologyGraph) {
        tracing::debug!(
            devices = graph.vertex_count(),
            links = graph.link_count(),
            "publishing topology snapshot"
        );
        self.current.store(Arc::new(graph));
    }
}

impl Default for InMemoryTopology {
    fn default() -> Self {
        Self::new(TopologyGraph::default())
    }
}

impl TopologyService for InMemoryTopology {
    fn current_topology(&self) -> RoutingResult<Arc<TopologyGraph>> {
        Ok(self.current.load_full())
    }
}

/// Host attachment lookup
pub trait HostService: Send + Sync {
    /// Edge port a host is attached to
    fn host_location(&self, host: &HostId) -> Option<ConnectPoint>;
}

/// Concurrent host location table
#[derive(Default)]
pub struct InMemoryHostService {
    locations: DashMap<HostId, ConnectPoint>,
}

impl InMemoryHostService {
    /// Create empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or move a host
    pub fn set_location(&self, host: HostId, location: ConnectPoint) {
        self.locations.insert(host, location);
    }

    /// Forget a host
    pub fn remove(&self, host: &HostId) -> Option<ConnectPoint> {
        self.locations.remove(host).map(|(_, cp)| cp)
    }
}

impl HostService for InMemoryHostService {
    fn host_location(&self, host: &HostId) -> Option<ConnectPoint> {
        self.locations.get(host).map(|cp| cp.clone())
    }
}
