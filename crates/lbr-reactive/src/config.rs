//! Engine configuration

use lbr_common::{RoutingError, RoutingResult};
use lbr_path::{PathSelector, SearchLimits, WeigherKind, DEFAULT_MEASURE_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Priority of installed path intents
pub const DEFAULT_INTENT_PRIORITY: u32 = 65432;

/// Routing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Application name stamped on submitted intents
    pub app_name: String,
    /// Link weighting strategy
    pub weigher: WeigherKind,
    /// Cost band considered equivalent to the minimum
    pub measure_tolerance: f64,
    /// Longest route explored
    pub max_hops: usize,
    /// Route enumeration cap
    pub max_paths: usize,
    /// Intent priority
    pub intent_priority: u32,
    /// Pending trigger events before senders wait
    pub event_queue_capacity: usize,
    /// Trigger events processed in parallel
    pub max_concurrent_events: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let limits = SearchLimits::default();
        Self {
            app_name: "org.lbroute.app".into(),
            weigher: WeigherKind::default(),
            measure_tolerance: DEFAULT_MEASURE_TOLERANCE,
            max_hops: limits.max_hops,
            max_paths: limits.max_paths,
            intent_priority: DEFAULT_INTENT_PRIORITY,
            event_queue_capacity: 1024,
            max_concurrent_events: 64,
        }
    }
}

impl RoutingConfig {
    /// Load from a JSON file; absent fields take defaults
    pub fn load(path: impl AsRef<Path>) -> RoutingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RoutingError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> RoutingResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RoutingError::ConfigError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> RoutingResult<()> {
        if !self.measure_tolerance.is_finite() || self.measure_tolerance < 0.0 {
            return Err(RoutingError::ConfigError(format!(
                "measure_tolerance must be a non-negative number, got {}",
                self.measure_tolerance
            )));
        }
        if self.app_name.is_empty() {
            return Err(RoutingError::ConfigError("app_name is empty".into()));
        }

        let positive = [
            ("max_hops", self.max_hops),
            ("max_paths", self.max_paths),
            ("event_queue_capacity", self.event_queue_capacity),
            ("max_concurrent_events", self.max_concurrent_events),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RoutingError::ConfigError(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Enumeration bounds
    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_hops: self.max_hops,
            max_paths: self.max_paths,
        }
    }

    /// Path selector with the configured tolerance
    pub fn selector(&self) -> PathSelector {
        PathSelector::new().with_tolerance(self.measure_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RoutingConfig::default();
        assert_eq!(config.intent_priority, 65432);
        assert_eq!(config.measure_tolerance, 0.05);
        assert_eq!(config.weigher, WeigherKind::Bandwidth);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: RoutingConfig =
            serde_json::from_str(r#"{"weigher": "metric", "max_hops": 8}"#).unwrap();
        assert_eq!(config.weigher, WeigherKind::Metric);
        assert_eq!(config.search_limits().max_hops, 8);
        assert_eq!(config.max_paths, 10_000);
    }

    #[test]
    fn test_validate_rejects() {
        let bad = [
            RoutingConfig { measure_tolerance: f64::NAN, ..Default::default() },
            RoutingConfig { measure_tolerance: -0.1, ..Default::default() },
            RoutingConfig { max_concurrent_events: 0, ..Default::default() },
            RoutingConfig { event_queue_capacity: 0, ..Default::default() },
            RoutingConfig { app_name: String::new(), ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(RoutingError::ConfigError(_))));
        }
    }

    #[test]
    fn test_save_load() {
        let path = std::env::temp_dir().join(format!("lbroute-config-{}.json", std::process::id()));
        let config = RoutingConfig {
            measure_tolerance: 1.5,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = RoutingConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RoutingConfig::load("/nonexistent/lbroute.json").unwrap_err();
        assert!(matches!(err, RoutingError::IoError(_)));
    }
}
