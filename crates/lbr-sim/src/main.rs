//! LBRoute Simulator
//!
//! Runs the load-balanced path engine against topology description files.
//!
//! # Usage
//!
//! ```bash
//! lbroute paths --topology net.json --src of:1 --dst 00:00:00:00:00:02
//! lbroute replay --topology net.json --events events.json
//! lbroute config > lbroute.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lbr_path::{LoadBalanceRouting, RoutingService};
use lbr_reactive::{EngineDeps, InMemoryIntentService, RoutingConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;
mod scenario;

use output::{OutputFormat, PathReport, ReplayReport};
use scenario::{load_events, parse_element, TopologyFile};

#[derive(Parser)]
#[command(name = "lbroute")]
#[command(version)]
#[command(about = "Load-balanced reactive routing simulator", long_about = None)]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(long, global = true, env = "LBROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the load-balanced path between two elements
    Paths {
        /// Topology description
        #[arg(long, short)]
        topology: PathBuf,
        /// Source device id or host MAC
        #[arg(long)]
        src: String,
        /// Destination device id or host MAC
        #[arg(long)]
        dst: String,
    },
    /// Feed trigger events through the reactive engine
    Replay {
        /// Topology description
        #[arg(long, short)]
        topology: PathBuf,
        /// Event list
        #[arg(long, short)]
        events: PathBuf,
        /// Give up waiting for processing after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RoutingConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RoutingConfig::default(),
    };

    match cli.command {
        Commands::Paths { topology, src, dst } => {
            let report = paths(&config, &topology, &src, &dst)?;
            cli.format.print(&report);
        }
        Commands::Replay {
            topology,
            events,
            timeout_secs,
        } => {
            let report = replay(config, &topology, &events, Duration::from_secs(timeout_secs)).await?;
            cli.format.print(&report);
        }
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn paths(config: &RoutingConfig, topology: &Path, src: &str, dst: &str) -> Result<PathReport> {
    let net = TopologyFile::load(topology)?.build();
    let (src, dst) = (parse_element(src)?, parse_element(dst)?);

    let routing = LoadBalanceRouting::new(net.topology, config.weigher.build(net.stats))
        .with_hosts(net.hosts)
        .with_selector(config.selector())
        .with_limits(config.search_limits());

    let path = routing.load_balance_paths(&src, &dst).into_iter().next();
    Ok(PathReport::new(&src, &dst, path.as_ref()))
}

async fn replay(
    config: RoutingConfig,
    topology: &Path,
    events: &Path,
    timeout: Duration,
) -> Result<ReplayReport> {
    let net = TopologyFile::load(topology)?.build();
    let events = load_events(events)?;
    let intents = Arc::new(InMemoryIntentService::new());

    let deps = EngineDeps {
        topology: net.topology,
        hosts: net.hosts,
        port_stats: net.stats,
        intents: intents.clone(),
    };
    let engine = lbr_reactive::start(deps, config)?;

    let mut expected = 0u64;
    for event in &events {
        for _ in 0..event.repeat {
            engine.submit(event.packet()).await?;
            expected += 1;
        }
    }

    let forwarder = engine.forwarder().clone();
    let waited = tokio::time::timeout(timeout, async {
        while forwarder.stats().snapshot().total() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if waited.is_err() {
        tracing::warn!(expected, "timed out waiting for events, stopping anyway");
    }

    let stats = forwarder.stats().snapshot();
    let installed = intents.installed();
    let teardown = engine.stop().await;

    Ok(ReplayReport::new(stats, &installed, teardown))
}
