//! Topology and event description files

use anyhow::{bail, Context, Result};
use lbr_common::{build_ipv4_frame, ConnectPoint, DeviceId, ElementId, HostId, MacAddr};
use lbr_path::{InMemoryHostService, InMemoryTopology, Link, LinkState, PortStatsCollector, TopologyGraph};
use lbr_reactive::{DefaultPacketContext, InboundPacket};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

/// Link entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    #[serde(default)]
    pub state: LinkState,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Also add the reverse link
    #[serde(default)]
    pub bidirectional: bool,
}

/// Port speed and optional load sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    pub port: ConnectPoint,
    pub speed_mbps: u64,
    #[serde(default)]
    pub load_bytes_per_sec: Option<u64>,
}

/// Host attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSpec {
    pub mac: MacAddr,
    pub location: ConnectPoint,
}

/// Topology description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyFile {
    /// Devices without links
    pub devices: Vec<DeviceId>,
    pub links: Vec<LinkSpec>,
    pub ports: Vec<PortSpec>,
    pub hosts: Vec<HostSpec>,
    /// Speed for ports not listed in `ports`
    pub default_speed_mbps: Option<u64>,
}

/// In-memory collaborators built from a topology file
pub struct Network {
    pub topology: Arc<InMemoryTopology>,
    pub hosts: Arc<InMemoryHostService>,
    pub stats: Arc<PortStatsCollector>,
}

impl TopologyFile {
    /// Load from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing topology {}", path.display()))
    }

    /// Build topology, host and port statistics services
    pub fn build(&self) -> Network {
        let mut links = Vec::with_capacity(self.links.len() * 2);
        for spec in &self.links {
            let mut link = Link::new(spec.src.clone(), spec.dst.clone()).with_state(spec.state);
            link.annotations = spec.annotations.clone();
            if spec.bidirectional {
                let mut reverse = link.clone();
                std::mem::swap(&mut reverse.src, &mut reverse.dst);
                links.push(reverse);
            }
            links.push(link);
        }

        let stats = PortStatsCollector::default();
        if let Some(speed) = self.default_speed_mbps {
            for link in &links {
                stats.set_speed(&link.src, speed);
                stats.set_speed(&link.dst, speed);
            }
        }
        for port in &self.ports {
            stats.set_speed(&port.port, port.speed_mbps);
            if let Some(load) = port.load_bytes_per_sec {
                stats.record_load(&port.port, load);
            }
        }

        let hosts = InMemoryHostService::new();
        for host in &self.hosts {
            hosts.set_location(HostId(host.mac), host.location.clone());
        }

        let graph = TopologyGraph::new(self.devices.iter().cloned(), links);
        tracing::info!(
            devices = graph.vertex_count(),
            links = graph.link_count(),
            hosts = self.hosts.len(),
            "topology loaded"
        );

        Network {
            topology: Arc::new(InMemoryTopology::new(graph)),
            hosts: Arc::new(hosts),
            stats: Arc::new(stats),
        }
    }
}

fn one() -> usize {
    1
}

/// Trigger event: an IPv4 frame arriving on an edge port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    pub ingress: ConnectPoint,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    #[serde(default = "one")]
    pub repeat: usize,
}

impl EventSpec {
    /// Packet context for one occurrence
    pub fn packet(&self) -> DefaultPacketContext {
        let frame = build_ipv4_frame(self.src_mac, self.dst_mac, self.src_ip, self.dst_ip, 17);
        DefaultPacketContext::new(InboundPacket::new(self.ingress.clone(), frame))
    }
}

/// Load an event list
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<EventSpec>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading events {}", path.display()))?;
    let events: Vec<EventSpec> =
        serde_json::from_str(&content).with_context(|| format!("parsing events {}", path.display()))?;
    if events.iter().any(|e| e.repeat == 0) {
        bail!("event repeat count must be positive");
    }
    Ok(events)
}

/// Parse a path endpoint: MAC addresses name hosts, anything else a device
pub fn parse_element(s: &str) -> Result<ElementId> {
    if s.is_empty() {
        bail!("empty element id");
    }
    Ok(match s.parse::<MacAddr>() {
        Ok(mac) => ElementId::Host(HostId(mac)),
        Err(_) => ElementId::Device(DeviceId::new(s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbr_path::{PortStatisticsService, TopologyService};
    use lbr_reactive::PacketContext;

    const TOPOLOGY: &str = r#"{
        "links": [
            {"src": "of:1/1", "dst": "of:2/1", "bidirectional": true},
            {"src": "of:2/2", "dst": "of:3/1", "state": "inactive", "annotations": {"metric": "3"}}
        ],
        "ports": [{"port": "of:1/1", "speed_mbps": 100, "load_bytes_per_sec": 1250000}],
        "hosts": [{"mac": "00:00:00:00:00:01", "location": "of:1/10"}],
        "default_speed_mbps": 1000
    }"#;

    #[test]
    fn test_build_network() {
        let file: TopologyFile = serde_json::from_str(TOPOLOGY).unwrap();
        let net = file.build();

        let graph = net.topology.current_topology().unwrap();
        assert_eq!(graph.link_count(), 3);
        assert_eq!(graph.vertex_count(), 3);
        assert!(graph.edges_from(&"of:2".into()).iter().any(|l| !l.is_active()));

        let port = ConnectPoint::new("of:1", 1);
        assert_eq!(net.stats.port_speed_mbps(&port), Some(100));
        assert_eq!(net.stats.load_bytes_per_sec(&port), Some(1_250_000));
        assert_eq!(net.stats.port_speed_mbps(&ConnectPoint::new("of:3", 1)), Some(1000));
    }

    #[test]
    fn test_event_defaults() {
        let events: Vec<EventSpec> = serde_json::from_str(
            r#"[{"ingress": "of:1/10", "src_mac": "00:00:00:00:00:01",
                 "dst_mac": "00:00:00:00:00:02", "src_ip": "10.0.0.1", "dst_ip": "10.0.0.2"}]"#,
        )
        .unwrap();
        assert_eq!(events[0].repeat, 1);
        let packet = events[0].packet();
        let headers = packet.in_packet().parsed().unwrap();
        assert!(headers.flow_key().is_some());
    }

    #[test]
    fn test_parse_element() {
        assert!(matches!(parse_element("00:00:00:00:00:01").unwrap(), ElementId::Host(_)));
        assert!(matches!(parse_element("of:1").unwrap(), ElementId::Device(_)));
        assert!(parse_element("").is_err());
    }
}
