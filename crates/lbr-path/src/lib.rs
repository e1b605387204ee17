//! Load-Balanced Path Computation
//!
//! Congestion-aware path choice over immutable topology snapshots.
//!
//! # Pipeline
//!
//! - Enumerate every loop-free route between two devices
//! - Weigh links by utilisation (or administrative metric)
//! - Cost a route by its most congested link
//! - Keep the near-minimum cost band, then prefer fewer hops

#![warn(missing_docs)]

pub mod cost;
pub mod routing;
pub mod search;
pub mod selector;
pub mod stats;
pub mod topology;
pub mod weight;

pub use cost::{bottleneck_cost, score_routes, ScoredPath};
pub use routing::{LoadBalanceRouting, RoutingService};
pub use search::{find_all_routes, Route, SearchLimits};
pub use selector::{PathSelector, DEFAULT_MEASURE_TOLERANCE};
pub use stats::{PortStatisticsService, PortStats, PortStatsCollector};
pub use topology::{
    HostService, InMemoryHostService, InMemoryTopology, Link, LinkState, TopologyGraph,
    TopologyService,
};
pub use weight::{BandwidthLinkWeight, LinkWeigher, MetricLinkWeight, WeigherKind};
