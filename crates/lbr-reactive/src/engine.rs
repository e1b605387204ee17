//! Engine lifecycle
//!
//! `start` wires the collaborators into a forwarder and spawns a dispatcher
//! that processes trigger events concurrently. `stop` closes intake, waits
//! for in-flight events, then withdraws and purges every installed intent.

use crate::config::RoutingConfig;
use crate::intent::{IntentId, IntentService};
use crate::packet::PacketContext;
use crate::processor::{ProcessOutcome, ReactiveForwarder};
use lbr_common::{RoutingError, RoutingResult};
use lbr_path::{HostService, LoadBalanceRouting, PortStatisticsService, TopologyService};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Queued trigger event
pub type Event = Box<dyn PacketContext>;

/// Collaborators the engine runs against
#[derive(Clone)]
pub struct EngineDeps {
    /// Topology snapshots
    pub topology: Arc<dyn TopologyService>,
    /// Host attachment points
    pub hosts: Arc<dyn HostService>,
    /// Port speed and load
    pub port_stats: Arc<dyn PortStatisticsService>,
    /// Intent installer
    pub intents: Arc<dyn IntentService>,
}

/// Cloneable event intake
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Queue a trigger event, waiting while the queue is full
    pub async fn send(&self, ctx: impl PacketContext + 'static) -> RoutingResult<()> {
        self.tx
            .send(Box::new(ctx))
            .await
            .map_err(|_| RoutingError::EngineStopped)
    }
}

/// Result of engine teardown
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    /// Queued events dropped without processing
    pub discarded_events: usize,
    /// Installed flows found in the cache
    pub flows: usize,
    /// Intents withdrawn and purged
    pub revoked: usize,
    /// Intents that could not be revoked
    pub failed: Vec<IntentId>,
}

impl TeardownReport {
    /// Whether every intent was revoked
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Running engine
///
/// Dropping the handle without `stop` still tears the engine down, in a
/// background task on the runtime it was started on.
pub struct EngineHandle {
    sender: EventSender,
    forwarder: Arc<ReactiveForwarder>,
    shutdown: watch::Sender<bool>,
    dispatcher: Option<JoinHandle<usize>>,
    runtime: tokio::runtime::Handle,
}

/// Start the engine on the current Tokio runtime
pub fn start(deps: EngineDeps, config: RoutingConfig) -> RoutingResult<EngineHandle> {
    config.validate()?;
    let runtime =
        tokio::runtime::Handle::try_current().map_err(|e| RoutingError::Runtime(e.to_string()))?;

    let weigher = config.weigher.build(deps.port_stats);
    let routing = LoadBalanceRouting::new(deps.topology, weigher)
        .with_hosts(deps.hosts)
        .with_selector(config.selector())
        .with_limits(config.search_limits());
    let forwarder = Arc::new(
        ReactiveForwarder::new(Arc::new(routing), deps.intents, config.app_name.clone())
            .with_priority(config.intent_priority),
    );

    let (tx, rx) = mpsc::channel(config.event_queue_capacity);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let dispatcher = Dispatcher {
        rx,
        shutdown: shutdown_rx,
        forwarder: forwarder.clone(),
        permits: Arc::new(Semaphore::new(config.max_concurrent_events)),
    };

    tracing::info!(
        app = %config.app_name,
        weigher = ?config.weigher,
        tolerance = config.measure_tolerance,
        "routing engine started"
    );

    Ok(EngineHandle {
        sender: EventSender { tx },
        forwarder,
        shutdown,
        dispatcher: Some(runtime.spawn(dispatcher.run())),
        runtime,
    })
}

impl EngineHandle {
    /// Event intake; fails with `EngineStopped` once stop begins
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Queue a trigger event
    pub async fn submit(&self, ctx: impl PacketContext + 'static) -> RoutingResult<()> {
        self.sender.send(ctx).await
    }

    /// Forwarder driving installations
    pub fn forwarder(&self) -> &Arc<ReactiveForwarder> {
        &self.forwarder
    }

    /// Stop intake, drain in-flight events, revoke every installed intent
    ///
    /// Revocation failures are logged and reported; they never stop the
    /// remaining revocations.
    pub async fn stop(mut self) -> TeardownReport {
        tracing::info!("stopping routing engine");
        let _ = self.shutdown.send(true);
        teardown(self.dispatcher.take(), self.forwarder.clone()).await
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let Some(dispatcher) = self.dispatcher.take() else {
            return;
        };
        tracing::warn!("engine handle dropped without stop, tearing down in background");
        let _ = self.shutdown.send(true);
        self.runtime.spawn(teardown(Some(dispatcher), self.forwarder.clone()));
    }
}

async fn teardown(
    dispatcher: Option<JoinHandle<usize>>,
    forwarder: Arc<ReactiveForwarder>,
) -> TeardownReport {
    let discarded_events = match dispatcher {
        Some(dispatcher) => match dispatcher.await {
            Ok(discarded) => discarded,
            Err(e) => {
                tracing::error!(error = %e, "dispatcher terminated abnormally");
                0
            }
        },
        None => 0,
    };

    let flows = forwarder.cache().drain();
    let mut report = TeardownReport {
        discarded_events,
        flows: flows.len(),
        ..Default::default()
    };

    for (key, id) in flows {
        match forwarder.revoke(id).await {
            Ok(()) => report.revoked += 1,
            Err(e) => {
                tracing::warn!(%key, intent = %id, error = %e, "failed to revoke intent");
                report.failed.push(id);
            }
        }
    }

    tracing::info!(
        revoked = report.revoked,
        failed = report.failed.len(),
        discarded = report.discarded_events,
        "routing engine stopped"
    );
    report
}

struct Dispatcher {
    rx: mpsc::Receiver<Event>,
    shutdown: watch::Receiver<bool>,
    forwarder: Arc<ReactiveForwarder>,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    /// Returns the number of queued events discarded at shutdown
    async fn run(mut self) -> usize {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                // Also fires when the handle is dropped
                _ = self.shutdown.changed() => break,

                Some(done) = tasks.join_next(), if !tasks.is_empty() => log_task(done),

                event = self.rx.recv() => {
                    let Some(event) = event else { break };
                    let Ok(permit) = self.permits.clone().acquire_owned().await else { break };
                    let forwarder = self.forwarder.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        forwarder.process(event.as_ref()).await
                    });
                }
            }
        }

        self.rx.close();
        let mut discarded = 0;
        while self.rx.recv().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::warn!(discarded, "dropped queued events at shutdown");
        }

        tracing::debug!(in_flight = tasks.len(), "draining in-flight events");
        while let Some(done) = tasks.join_next().await {
            log_task(done);
        }
        discarded
    }
}

fn log_task(done: Result<ProcessOutcome, JoinError>) {
    match done {
        Ok(outcome) => tracing::trace!(%outcome, "event processed"),
        Err(e) => tracing::error!(error = %e, "event task failed"),
    }
}
