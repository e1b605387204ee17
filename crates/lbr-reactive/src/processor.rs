//! Reactive forwarder: one path intent per new flow
//!
//! Per event: skip handled events, derive the flow key, reserve it in the
//! dedup cache, compute a load-balanced path, submit the intent and record
//! it. Every consumed event is marked handled.

use crate::cache::{FlowCache, Reserve};
use crate::config::DEFAULT_INTENT_PRIORITY;
use crate::intent::{IntentId, IntentService, PathIntent};
use crate::packet::PacketContext;
use lbr_common::{AtomicCounter, ElementId, FlowKey, HostId, RoutingResult};
use lbr_path::RoutingService;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Result of processing one trigger event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handled earlier, or not IP traffic
    Ignored,
    /// Frame could not be parsed
    Rejected,
    /// Flow already reserved or installed
    Duplicate,
    /// No usable path between the endpoints
    NoPath,
    /// Intent submitted and recorded
    Installed(IntentId),
    /// Intent service refused the submission
    Failed,
    /// Engine is shutting down
    Stopped,
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => f.write_str("ignored"),
            Self::Rejected => f.write_str("rejected"),
            Self::Duplicate => f.write_str("duplicate"),
            Self::NoPath => f.write_str("no-path"),
            Self::Installed(id) => write!(f, "installed({id})"),
            Self::Failed => f.write_str("failed"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Outcome counters
#[derive(Debug, Default)]
pub struct ForwarderStats {
    ignored: AtomicCounter,
    rejected: AtomicCounter,
    duplicates: AtomicCounter,
    no_path: AtomicCounter,
    installed: AtomicCounter,
    failed: AtomicCounter,
    stopped: AtomicCounter,
}

impl ForwarderStats {
    #[inline]
    fn record(&self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Ignored => self.ignored.inc(),
            ProcessOutcome::Rejected => self.rejected.inc(),
            ProcessOutcome::Duplicate => self.duplicates.inc(),
            ProcessOutcome::NoPath => self.no_path.inc(),
            ProcessOutcome::Installed(_) => self.installed.inc(),
            ProcessOutcome::Failed => self.failed.inc(),
            ProcessOutcome::Stopped => self.stopped.inc(),
        };
    }

    /// Point-in-time copy
    pub fn snapshot(&self) -> ForwarderStatsSnapshot {
        ForwarderStatsSnapshot {
            ignored: self.ignored.get(),
            rejected: self.rejected.get(),
            duplicates: self.duplicates.get(),
            no_path: self.no_path.get(),
            installed: self.installed.get(),
            failed: self.failed.get(),
            stopped: self.stopped.get(),
        }
    }
}

/// Outcome counters (non-atomic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwarderStatsSnapshot {
    /// Already handled or non-IP
    pub ignored: u64,
    /// Malformed frames
    pub rejected: u64,
    /// Dedup hits
    pub duplicates: u64,
    /// No usable path
    pub no_path: u64,
    /// Intents recorded
    pub installed: u64,
    /// Submission failures
    pub failed: u64,
    /// Refused during shutdown
    pub stopped: u64,
}

impl ForwarderStatsSnapshot {
    /// Events seen
    pub fn total(&self) -> u64 {
        self.ignored
            + self.rejected
            + self.duplicates
            + self.no_path
            + self.installed
            + self.failed
            + self.stopped
    }
}

/// Installs load-balanced path intents for new flows
pub struct ReactiveForwarder {
    routing: Arc<dyn RoutingService>,
    intents: Arc<dyn IntentService>,
    cache: FlowCache,
    app: String,
    priority: u32,
    stats: ForwarderStats,
}

impl ReactiveForwarder {
    /// Create a forwarder with an empty cache
    pub fn new(
        routing: Arc<dyn RoutingService>,
        intents: Arc<dyn IntentService>,
        app: impl Into<String>,
    ) -> Self {
        Self {
            routing,
            intents,
            cache: FlowCache::new(),
            app: app.into(),
            priority: DEFAULT_INTENT_PRIORITY,
            stats: ForwarderStats::default(),
        }
    }

    /// Set intent priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Dedup cache
    pub fn cache(&self) -> &FlowCache {
        &self.cache
    }

    /// Outcome counters
    pub fn stats(&self) -> &ForwarderStats {
        &self.stats
    }

    /// Process one trigger event
    pub async fn process(&self, ctx: &dyn PacketContext) -> ProcessOutcome {
        let outcome = self.handle(ctx).await;
        self.stats.record(&outcome);
        outcome
    }

    async fn handle(&self, ctx: &dyn PacketContext) -> ProcessOutcome {
        if ctx.is_handled() {
            return ProcessOutcome::Ignored;
        }

        let packet = ctx.in_packet();
        let headers = match packet.parsed() {
            Ok(headers) => headers,
            Err(e) => {
                tracing::warn!(from = %packet.received_from, error = %e, "dropping malformed frame");
                ctx.block();
                return ProcessOutcome::Rejected;
            }
        };
        let Some(key) = headers.flow_key() else {
            return ProcessOutcome::Ignored;
        };

        let reservation = match self.cache.try_reserve(key) {
            Reserve::Reserved(reservation) => reservation,
            Reserve::Duplicate => {
                tracing::debug!(%key, "flow already handled");
                ctx.block();
                return ProcessOutcome::Duplicate;
            }
            Reserve::Closed => {
                ctx.block();
                return ProcessOutcome::Stopped;
            }
        };

        // Source is the ingress switch; the destination host is resolved by routing
        let src = ElementId::Device(packet.received_from.device.clone());
        let dst = ElementId::Host(HostId(headers.dst_mac));
        let Some(path) = self.routing.load_balance_paths(&src, &dst).into_iter().next() else {
            tracing::warn!(%key, %src, %dst, "no path available");
            ctx.block();
            return ProcessOutcome::NoPath;
        };

        tracing::info!(%key, %path, "installing path intent");
        let intent = PathIntent {
            app: self.app.clone(),
            priority: self.priority,
            key,
            path,
        };

        let outcome = match self.intents.submit(intent).await {
            Ok(id) => match reservation.commit(id) {
                Ok(()) => ProcessOutcome::Installed(id),
                Err(id) => {
                    // Cache drained during submission; this intent is ours to remove
                    if let Err(e) = self.revoke(id).await {
                        tracing::warn!(%key, intent = %id, error = %e, "failed to revoke late intent");
                    }
                    ProcessOutcome::Stopped
                }
            },
            Err(e) => {
                tracing::warn!(%key, error = %e, "intent submission failed");
                ProcessOutcome::Failed
            }
        };
        ctx.block();
        outcome
    }

    /// Withdraw and purge an intent
    pub async fn revoke(&self, id: IntentId) -> RoutingResult<()> {
        self.intents.withdraw(id).await?;
        self.intents.purge(id).await
    }

    /// Remove an installed flow and its intent
    ///
    /// Returns false if the flow is not installed.
    pub async fn withdraw_flow(&self, key: &FlowKey) -> RoutingResult<bool> {
        let Some(id) = self.cache.remove(key) else {
            return Ok(false);
        };
        tracing::info!(%key, intent = %id, "withdrawing flow");
        self.revoke(id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{InMemoryIntentService, IntentState};
    use crate::packet::{DefaultPacketContext, InboundPacket};
    use lbr_common::{build_ipv4_frame, ConnectPoint, MacAddr};
    use lbr_path::{
        InMemoryHostService, InMemoryTopology, LoadBalanceRouting, Link, MetricLinkWeight,
        TopologyGraph,
    };
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const H1: MacAddr = MacAddr([0, 0, 0, 0, 0, 1]);
    const H2: MacAddr = MacAddr([0, 0, 0, 0, 0, 2]);
    const H3: MacAddr = MacAddr([0, 0, 0, 0, 0, 3]);

    struct Fixture {
        forwarder: Arc<ReactiveForwarder>,
        intents: Arc<InMemoryIntentService>,
        hosts: Arc<InMemoryHostService>,
    }

    fn fixture(intents: InMemoryIntentService) -> Fixture {
        let link = |a: &str, b: &str| Link::new(ConnectPoint::new(a, 1), ConnectPoint::new(b, 2));
        let graph = TopologyGraph::from_links([
            link("A", "B"),
            link("B", "D"),
            link("A", "C"),
            link("C", "D"),
            link("D", "A"),
        ]);
        let hosts = Arc::new(InMemoryHostService::new());
        hosts.set_location(HostId(H1), ConnectPoint::new("A", 10));
        hosts.set_location(HostId(H2), ConnectPoint::new("D", 10));

        let routing = LoadBalanceRouting::new(
            Arc::new(InMemoryTopology::new(graph)),
            Arc::new(MetricLinkWeight),
        )
        .with_hosts(hosts.clone());
        let intents = Arc::new(intents);
        let forwarder = ReactiveForwarder::new(Arc::new(routing), intents.clone(), "test");

        Fixture {
            forwarder: Arc::new(forwarder),
            intents,
            hosts,
        }
    }

    fn ctx(from: &str, src: MacAddr, dst: MacAddr) -> DefaultPacketContext {
        let frame = build_ipv4_frame(
            src,
            dst,
            Ipv4Addr::new(10, 0, 0, src.0[5]),
            Ipv4Addr::new(10, 0, 0, dst.0[5]),
            17,
        );
        DefaultPacketContext::new(InboundPacket::new(ConnectPoint::new(from, 10), frame))
    }

    fn raw_ctx(data: Vec<u8>) -> DefaultPacketContext {
        DefaultPacketContext::new(InboundPacket::new(ConnectPoint::new("A", 10), data))
    }

    #[tokio::test]
    async fn test_install_then_duplicate() {
        let f = fixture(InMemoryIntentService::new());

        let first = ctx("A", H1, H2);
        let outcome = f.forwarder.process(&first).await;
        let ProcessOutcome::Installed(id) = outcome else {
            panic!("expected install, got {outcome}");
        };
        assert!(first.is_handled());

        let installed = f.intents.installed();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].1.priority, 65432);
        assert_eq!(installed[0].1.path.hop_count(), 2);

        let again = ctx("A", H1, H2);
        assert_eq!(f.forwarder.process(&again).await, ProcessOutcome::Duplicate);
        assert!(again.is_handled());
        assert_eq!(f.intents.submitted(), 1);

        let key = FlowKey::from_v4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(f.forwarder.cache().get(&key), Some(id));
    }

    #[tokio::test]
    async fn test_reverse_flow_is_distinct() {
        let f = fixture(InMemoryIntentService::new());
        assert!(matches!(
            f.forwarder.process(&ctx("A", H1, H2)).await,
            ProcessOutcome::Installed(_)
        ));
        assert!(matches!(
            f.forwarder.process(&ctx("D", H2, H1)).await,
            ProcessOutcome::Installed(_)
        ));
        assert_eq!(f.forwarder.stats().snapshot().duplicates, 0);
    }

    #[tokio::test]
    async fn test_handled_event_skipped() {
        let f = fixture(InMemoryIntentService::new());
        let event = ctx("A", H1, H2);
        event.block();

        assert_eq!(f.forwarder.process(&event).await, ProcessOutcome::Ignored);
        assert!(f.forwarder.cache().is_empty());
        assert_eq!(f.intents.submitted(), 0);
    }

    #[tokio::test]
    async fn test_non_ip_left_unhandled() {
        let f = fixture(InMemoryIntentService::new());
        // ARP
        let mut frame = vec![0xffu8; 6];
        frame.extend_from_slice(&H1.0);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0u8; 28]);
        let event = raw_ctx(frame);

        assert_eq!(f.forwarder.process(&event).await, ProcessOutcome::Ignored);
        assert!(!event.is_handled());
    }

    #[tokio::test]
    async fn test_malformed_rejected_processing_continues() {
        let f = fixture(InMemoryIntentService::new());

        let mut truncated = build_ipv4_frame(H1, H2, Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, 6);
        truncated.truncate(20);
        let bad = raw_ctx(truncated);
        assert_eq!(f.forwarder.process(&bad).await, ProcessOutcome::Rejected);
        assert!(bad.is_handled());

        assert!(matches!(
            f.forwarder.process(&ctx("A", H1, H2)).await,
            ProcessOutcome::Installed(_)
        ));
        let stats = f.forwarder.stats().snapshot();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.installed, 1);
        assert_eq!(stats.total(), 2);
    }

    #[tokio::test]
    async fn test_no_path_releases_key() {
        let f = fixture(InMemoryIntentService::new());

        // H3 location unknown
        let event = ctx("A", H1, H3);
        assert_eq!(f.forwarder.process(&event).await, ProcessOutcome::NoPath);
        assert!(event.is_handled());
        assert!(f.forwarder.cache().is_empty());

        f.hosts.set_location(HostId(H3), ConnectPoint::new("C", 10));
        assert!(matches!(
            f.forwarder.process(&ctx("A", H1, H3)).await,
            ProcessOutcome::Installed(_)
        ));
    }

    #[tokio::test]
    async fn test_submit_failure_releases_key() {
        let f = fixture(InMemoryIntentService::new());
        f.intents.set_fail_submit(true);

        let event = ctx("A", H1, H2);
        assert_eq!(f.forwarder.process(&event).await, ProcessOutcome::Failed);
        assert!(event.is_handled());
        assert!(f.forwarder.cache().is_empty());

        f.intents.set_fail_submit(false);
        assert!(matches!(
            f.forwarder.process(&ctx("A", H1, H2)).await,
            ProcessOutcome::Installed(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_install_once() {
        let f = fixture(InMemoryIntentService::new().with_submit_delay(Duration::from_millis(20)));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let forwarder = f.forwarder.clone();
                tokio::spawn(async move { forwarder.process(&ctx("A", H1, H2)).await })
            })
            .collect();

        let mut installed = 0;
        for task in tasks {
            match task.await.unwrap() {
                ProcessOutcome::Installed(_) => installed += 1,
                ProcessOutcome::Duplicate => {}
                other => panic!("unexpected outcome {other}"),
            }
        }

        assert_eq!(installed, 1);
        assert_eq!(f.intents.submitted(), 1);
        assert_eq!(f.forwarder.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_cache_stops() {
        let f = fixture(InMemoryIntentService::new());
        f.forwarder.cache().drain();

        assert_eq!(f.forwarder.process(&ctx("A", H1, H2)).await, ProcessOutcome::Stopped);
        assert_eq!(f.intents.submitted(), 0);
    }

    #[tokio::test]
    async fn test_drain_during_submit_revokes() {
        let f = fixture(InMemoryIntentService::new().with_submit_delay(Duration::from_millis(50)));

        let forwarder = f.forwarder.clone();
        let task = tokio::spawn(async move { forwarder.process(&ctx("A", H1, H2)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.forwarder.cache().drain().is_empty());

        assert_eq!(task.await.unwrap(), ProcessOutcome::Stopped);
        assert_eq!(f.intents.submitted(), 1);
        assert!(f.intents.is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_flow() {
        let f = fixture(InMemoryIntentService::new());
        let ProcessOutcome::Installed(id) = f.forwarder.process(&ctx("A", H1, H2)).await else {
            panic!("expected install");
        };
        let key = FlowKey::from_v4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));

        assert!(f.forwarder.withdraw_flow(&key).await.unwrap());
        assert_eq!(f.intents.state(id), None::<IntentState>);
        assert!(!f.forwarder.withdraw_flow(&key).await.unwrap());

        // Flow can be installed again
        assert!(matches!(
            f.forwarder.process(&ctx("A", H1, H2)).await,
            ProcessOutcome::Installed(_)
        ));
    }
}
