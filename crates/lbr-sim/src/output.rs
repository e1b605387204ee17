//! Output formatting

use clap::ValueEnum;
use lbr_common::ElementId;
use lbr_path::ScoredPath;
use lbr_reactive::{ForwarderStatsSnapshot, IntentId, PathIntent, TeardownReport};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn print<T: Serialize + fmt::Display>(&self, data: &T) {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
            }
            OutputFormat::Text => println!("{data}"),
        }
    }
}

/// Result of a single path query
#[derive(Debug, Serialize)]
pub struct PathReport {
    pub src: String,
    pub dst: String,
    pub found: bool,
    pub cost: Option<f64>,
    pub hops: usize,
    pub links: Vec<String>,
}

impl PathReport {
    pub fn new(src: &ElementId, dst: &ElementId, path: Option<&ScoredPath>) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
            found: path.is_some(),
            cost: path.map(ScoredPath::cost),
            hops: path.map_or(0, ScoredPath::hop_count),
            links: path
                .map(|p| p.links().iter().map(|l| l.to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for PathReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(cost) = self.cost else {
            return write!(f, "no path from {} to {}", self.src, self.dst);
        };
        writeln!(f, "{} -> {} ({} hops, cost {:.3})", self.src, self.dst, self.hops, cost)?;
        for link in &self.links {
            writeln!(f, "  {link}")?;
        }
        Ok(())
    }
}

/// Installed intent summary
#[derive(Debug, Serialize)]
pub struct IntentSummary {
    pub id: String,
    pub flow: String,
    pub priority: u32,
    pub path: String,
}

/// Result of an event replay
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub stats: ForwarderStatsSnapshot,
    pub intents: Vec<IntentSummary>,
    pub teardown: TeardownReport,
}

impl ReplayReport {
    pub fn new(
        stats: ForwarderStatsSnapshot,
        installed: &[(IntentId, PathIntent)],
        teardown: TeardownReport,
    ) -> Self {
        let intents = installed
            .iter()
            .map(|(id, intent)| IntentSummary {
                id: id.to_string(),
                flow: intent.key.to_string(),
                priority: intent.priority,
                path: intent.path.to_string(),
            })
            .collect();
        Self {
            stats,
            intents,
            teardown,
        }
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(
            f,
            "events: {} (installed {}, duplicate {}, no-path {}, rejected {}, ignored {}, failed {}, stopped {})",
            s.total(),
            s.installed,
            s.duplicates,
            s.no_path,
            s.rejected,
            s.ignored,
            s.failed,
            s.stopped
        )?;
        for intent in &self.intents {
            writeln!(f, "  {} {} via {}", intent.id, intent.flow, intent.path)?;
        }
        write!(
            f,
            "teardown: revoked {}/{}, failed {}, discarded {}",
            self.teardown.revoked,
            self.teardown.flows,
            self.teardown.failed.len(),
            self.teardown.discarded_events
        )
    }
}
