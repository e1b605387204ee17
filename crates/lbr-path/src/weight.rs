//! Link weighting strategies

use crate::stats::PortStatisticsService;
use crate::topology::Link;
use lbr_common::ConnectPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scores a single link
pub trait LinkWeigher: Send + Sync {
    /// Weight an empty path starts from
    fn initial_weight(&self) -> f64 {
        0.0
    }

    /// Weight reported for links that cannot carry traffic
    fn non_viable_weight(&self) -> f64;

    /// Weight of one link
    fn weight(&self, link: &Link) -> f64;

    /// Whether routes may traverse the link at all
    fn is_viable(&self, link: &Link) -> bool {
        link.is_active()
    }
}

/// Congestion-based weight: 0 (idle) to 100 (saturated or down)
pub struct BandwidthLinkWeight {
    stats: Arc<dyn PortStatisticsService>,
}

impl BandwidthLinkWeight {
    /// Weight of an idle link
    pub const LINK_WEIGHT_IDLE: f64 = 0.0;
    /// Weight of an inactive link
    pub const LINK_WEIGHT_DOWN: f64 = 100.0;
    /// Weight of a saturated link
    pub const LINK_WEIGHT_FULL: f64 = 100.0;

    /// Create with a port statistics source
    pub fn new(stats: Arc<dyn PortStatisticsService>) -> Self {
        Self { stats }
    }

    /// Link capacity in bps (slower end)
    fn link_capacity_bps(&self, link: &Link) -> u64 {
        self.port_speed_bps(&link.src)
            .min(self.port_speed_bps(&link.dst))
    }

    /// Link load in bps (busier end)
    fn link_load_bps(&self, link: &Link) -> u64 {
        self.port_load_bps(&link.src)
            .max(self.port_load_bps(&link.dst))
    }

    #[inline]
    fn port_speed_bps(&self, port: &ConnectPoint) -> u64 {
        self.stats
            .port_speed_mbps(port)
            .unwrap_or(0)
            .saturating_mul(1_000_000)
    }

    #[inline]
    fn port_load_bps(&self, port: &ConnectPoint) -> u64 {
        self.stats
            .load_bytes_per_sec(port)
            .unwrap_or(0)
            .saturating_mul(8)
    }
}

impl LinkWeigher for BandwidthLinkWeight {
    fn initial_weight(&self) -> f64 {
        Self::LINK_WEIGHT_IDLE
    }

    fn non_viable_weight(&self) -> f64 {
        Self::LINK_WEIGHT_DOWN
    }

    fn weight(&self, link: &Link) -> f64 {
        if !link.is_active() {
            return Self::LINK_WEIGHT_DOWN;
        }

        let capacity = self.link_capacity_bps(link);
        let load = self.link_load_bps(link);
        if load >= capacity {
            return Self::LINK_WEIGHT_FULL;
        }

        let remaining = (capacity - load) as f64;
        100.0 - remaining / capacity as f64 * 100.0
    }
}

/// Administrative metric weight read from the `metric` annotation
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricLinkWeight;

impl MetricLinkWeight {
    /// Annotation key carrying the metric
    pub const METRIC_KEY: &'static str = "metric";
    /// Weight when no metric is configured
    pub const DEFAULT_METRIC: f64 = 1.0;
    /// Weight of an inactive link
    pub const NON_VIABLE: f64 = -1.0;
}

impl LinkWeigher for MetricLinkWeight {
    fn non_viable_weight(&self) -> f64 {
        Self::NON_VIABLE
    }

    fn weight(&self, link: &Link) -> f64 {
        if !link.is_active() {
            return Self::NON_VIABLE;
        }

        match link.annotation(Self::METRIC_KEY).filter(|m| !m.is_empty()) {
            Some(metric) => match metric.parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => value,
                _ => {
                    tracing::warn!(%link, metric, "invalid link metric, using default");
                    Self::DEFAULT_METRIC
                }
            },
            None => Self::DEFAULT_METRIC,
        }
    }
}

/// Weigher selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeigherKind {
    /// Congestion-aware load balancing
    #[default]
    Bandwidth,
    /// Administrative metric annotation
    Metric,
}

impl WeigherKind {
    /// Instantiate the strategy
    pub fn build(self, stats: Arc<dyn PortStatisticsService>) -> Arc<dyn LinkWeigher> {
        match self {
            Self::Bandwidth => Arc::new(BandwidthLinkWeight::new(stats)),
            Self::Metric => Arc::new(MetricLinkWeight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PortStatsCollector;
    use crate::topology::LinkState;

    fn setup(speed_a: u64, speed_b: u64, load_a: u64, load_b: u64) -> (BandwidthLinkWeight, Link) {
        let a = ConnectPoint::new("A", 1);
        let b = ConnectPoint::new("B", 1);
        let stats = PortStatsCollector::default();
        stats.set_speed(&a, speed_a);
        stats.set_speed(&b, speed_b);
        stats.record_load(&a, load_a);
        stats.record_load(&b, load_b);
        (BandwidthLinkWeight::new(Arc::new(stats)), Link::new(a, b))
    }

    #[test]
    fn test_idle_link() {
        let (weigher, link) = setup(1000, 1000, 0, 0);
        assert_eq!(weigher.weight(&link), 0.0);
    }

    #[test]
    fn test_congestion_percentage() {
        // 1000 Mbps vs 100 Mbps: capacity is the slower end
        // load 6.25 MB/s = 50 Mbps on the busier end => 50% congested
        let (weigher, link) = setup(1000, 100, 6_250_000, 1_000);
        let w = weigher.weight(&link);
        assert!((w - 50.0).abs() < 1e-9, "weight {w}");
    }

    #[test]
    fn test_saturated_link() {
        // 100 Mbps fully used
        let (weigher, link) = setup(100, 100, 12_500_000, 0);
        assert_eq!(weigher.weight(&link), BandwidthLinkWeight::LINK_WEIGHT_FULL);

        // Overloaded
        let (weigher, link) = setup(100, 100, 20_000_000, 0);
        assert_eq!(weigher.weight(&link), BandwidthLinkWeight::LINK_WEIGHT_FULL);
    }

    #[test]
    fn test_inactive_link() {
        let (weigher, link) = setup(1000, 1000, 0, 0);
        let link = link.with_state(LinkState::Inactive);
        assert_eq!(weigher.weight(&link), BandwidthLinkWeight::LINK_WEIGHT_DOWN);
        assert!(!weigher.is_viable(&link));
    }

    #[test]
    fn test_unknown_ports_are_full() {
        let weigher = BandwidthLinkWeight::new(Arc::new(PortStatsCollector::default()));
        let link = Link::new(ConnectPoint::new("A", 1), ConnectPoint::new("B", 1));
        assert_eq!(weigher.weight(&link), BandwidthLinkWeight::LINK_WEIGHT_FULL);
    }

    #[test]
    fn test_metric_weight() {
        let weigher = MetricLinkWeight;
        let link = Link::new(ConnectPoint::new("A", 1), ConnectPoint::new("B", 1));

        assert_eq!(weigher.weight(&link), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "4.5")), 4.5);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "")), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "fast")), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "NaN")), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "inf")), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "-5")), 1.0);
        assert_eq!(weigher.weight(&link.clone().with_annotation("metric", "0")), 0.0);
        assert_eq!(weigher.weight(&link.with_state(LinkState::Inactive)), -1.0);
    }

    #[test]
    fn test_weigher_kind_serde() {
        let kind: WeigherKind = serde_json::from_str("\"metric\"").unwrap();
        assert_eq!(kind, WeigherKind::Metric);
        assert_eq!(WeigherKind::default(), WeigherKind::Bandwidth);
    }
}
