//! Bottleneck path costing

use crate::search::Route;
use crate::topology::Link;
use crate::weight::LinkWeigher;
use lbr_common::DeviceId;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Route annotated with its cost
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPath {
    links: Route,
    cost: f64,
}

impl ScoredPath {
    /// Create from links and a precomputed cost
    pub fn new(links: Route, cost: f64) -> Self {
        Self { links, cost }
    }

    /// Links in traversal order
    pub fn links(&self) -> &[Arc<Link>] {
        &self.links
    }

    /// Path cost
    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of links
    #[inline]
    pub fn hop_count(&self) -> usize {
        self.links.len()
    }

    /// First device
    pub fn src(&self) -> Option<&DeviceId> {
        self.links.first().map(|l| &l.src.device)
    }

    /// Last device
    pub fn dst(&self) -> Option<&DeviceId> {
        self.links.last().map(|l| &l.dst.device)
    }

    /// Total order: cost, then link content
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.links.cmp(&other.links))
    }
}

impl fmt::Display for ScoredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{link}")?;
        }
        write!(f, "] cost={:.3}", self.cost)
    }
}

/// Cost of a route: the weight of its most congested link
///
/// Starts from the weigher's initial weight, so an empty route costs that.
pub fn bottleneck_cost(weigher: &dyn LinkWeigher, links: &[Arc<Link>]) -> f64 {
    links
        .iter()
        .map(|link| weigher.weight(link))
        .fold(weigher.initial_weight(), f64::max)
}

/// Score every route
pub fn score_routes(weigher: &dyn LinkWeigher, routes: Vec<Route>) -> Vec<ScoredPath> {
    routes
        .into_iter()
        .map(|route| {
            let cost = bottleneck_cost(weigher, &route);
            ScoredPath::new(route, cost)
        })
        .collect()
}
