//! Two-stage path selection: near-minimum cost band, then fewest hops

use crate::cost::ScoredPath;

/// Default cost tolerance for the near-optimal band
pub const DEFAULT_MEASURE_TOLERANCE: f64 = 0.05;

/// Picks one path from a candidate set
#[derive(Debug, Clone, Copy)]
pub struct PathSelector {
    /// Paths within this distance of the cheapest are equivalent
    tolerance: f64,
}

impl PathSelector {
    /// Create with the default tolerance
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_MEASURE_TOLERANCE,
        }
    }

    /// Set tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Current tolerance
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Select the fewest-hop path among those whose cost is strictly less
    /// than `tolerance` above the minimum
    ///
    /// Candidates are ordered by cost and then by link content before the
    /// scan, so the choice does not depend on input order.
    pub fn select_one(&self, mut paths: Vec<ScoredPath>) -> Option<ScoredPath> {
        if paths.is_empty() {
            return None;
        }

        paths.sort_by(ScoredPath::total_cmp);
        let band = self.min_cost_band(&paths);

        // min_by_key keeps the first of equal minima
        let best = band.iter().enumerate().min_by_key(|(_, p)| p.hop_count()).map(|(i, _)| i)?;
        Some(paths.swap_remove(best))
    }

    /// Prefix of cost-sorted `paths` within tolerance of the first
    pub fn min_cost_band<'a>(&self, paths: &'a [ScoredPath]) -> &'a [ScoredPath] {
        let Some(first) = paths.first() else {
            return paths;
        };
        let min_cost = first.cost();
        let len = paths
            .iter()
            .take_while(|p| p.cost() - min_cost < self.tolerance)
            .count()
            .max(1);
        &paths[..len]
    }
}

impl Default for PathSelector {
    fn default() -> Self {
        Self::new()
    }
}
