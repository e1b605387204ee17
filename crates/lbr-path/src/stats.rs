//! Port statistics collection and aggregation

use dashmap::DashMap;
use lbr_common::ConnectPoint;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Port capacity and load accessors used by the congestion weigher
pub trait PortStatisticsService: Send + Sync {
    /// Configured port speed in Mbps
    fn port_speed_mbps(&self, port: &ConnectPoint) -> Option<u64>;

    /// Current transmit rate in bytes per second
    fn load_bytes_per_sec(&self, port: &ConnectPoint) -> Option<u64>;
}

/// Aggregated port statistics with EWMA load
#[derive(Debug)]
pub struct PortStats {
    /// Port speed in Mbps
    speed_mbps: AtomicU64,
    /// EWMA load in bytes/s
    load_ewma: AtomicU64, // Stored as fixed-point (x1000)
    /// Sample count
    count: AtomicU64,
    /// Time of the latest load sample
    last_sample: RwLock<Option<Instant>>,
}

impl PortStats {
    const ALPHA: f64 = 0.2; // EWMA smoothing factor

    /// Create new stats
    pub fn new(speed_mbps: u64) -> Self {
        Self {
            speed_mbps: AtomicU64::new(speed_mbps),
            load_ewma: AtomicU64::new(0),
            count: AtomicU64::new(0),
            last_sample: RwLock::new(None),
        }
    }

    /// Update with a load sample
    #[inline]
    pub fn update_load(&self, bytes_per_sec: u64) {
        let count = self.count.fetch_add(1, Ordering::Relaxed);

        if count == 0 {
            // First sample - initialize
            self.load_ewma
                .store(bytes_per_sec.saturating_mul(1000), Ordering::Relaxed);
        } else {
            let current = self.load_ewma.load(Ordering::Relaxed) as f64 / 1000.0;
            let updated = Self::ALPHA * bytes_per_sec as f64 + (1.0 - Self::ALPHA) * current;
            self.load_ewma
                .store((updated * 1000.0) as u64, Ordering::Relaxed);
        }

        *self.last_sample.write() = Some(Instant::now());
    }

    /// Set port speed
    #[inline]
    pub fn set_speed(&self, speed_mbps: u64) {
        self.speed_mbps.store(speed_mbps, Ordering::Relaxed);
    }

    /// Get port speed
    #[inline]
    pub fn speed_mbps(&self) -> u64 {
        self.speed_mbps.load(Ordering::Relaxed)
    }

    /// Get current load estimate
    #[inline]
    pub fn load_bytes_per_sec(&self) -> u64 {
        self.load_ewma.load(Ordering::Relaxed) / 1000
    }

    /// Load estimate, if sampled within `max_age`
    pub fn fresh_load(&self, max_age: Duration) -> Option<u64> {
        let sampled = (*self.last_sample.read())?;
        (sampled.elapsed() <= max_age).then(|| self.load_bytes_per_sec())
    }
}

/// Lock-free port statistics collector
///
/// Configured speeds never expire. Load samples older than `max_age` read as
/// absent, so an idle port falls back to zero load.
pub struct PortStatsCollector {
    /// Stats per port
    stats: DashMap<ConnectPoint, PortStats>,
    /// Max age before load samples are considered stale
    max_age: Duration,
}

impl PortStatsCollector {
    /// Create new collector
    pub fn new(max_age: Duration) -> Self {
        Self {
            stats: DashMap::new(),
            max_age,
        }
    }

    /// Register or update a port's speed
    pub fn set_speed(&self, port: &ConnectPoint, speed_mbps: u64) {
        self.stats
            .entry(port.clone())
            .or_insert_with(|| PortStats::new(speed_mbps))
            .set_speed(speed_mbps);
    }

    /// Record a load sample
    #[inline]
    pub fn record_load(&self, port: &ConnectPoint, bytes_per_sec: u64) {
        self.stats
            .entry(port.clone())
            .or_insert_with(|| PortStats::new(0))
            .update_load(bytes_per_sec);
    }

    /// Number of tracked ports
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether no port is tracked
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

impl Default for PortStatsCollector {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl PortStatisticsService for PortStatsCollector {
    fn port_speed_mbps(&self, port: &ConnectPoint) -> Option<u64> {
        self.stats.get(port).map(|s| s.speed_mbps())
    }

    fn load_bytes_per_sec(&self, port: &ConnectPoint) -> Option<u64> {
        self.stats.get(port).and_then(|s| s.fresh_load(self.max_age))
    }
}
