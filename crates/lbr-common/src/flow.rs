//! Flow keys and frame parsing for reactive installation
//!
//! Zero-copy header extraction from raw Ethernet frames and the normalized
//! flow key used for deduplication.

use crate::{MacAddr, RoutingError, RoutingResult};
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// EtherType for IPv4
pub const ETH_TYPE_IPV4: u16 = 0x0800;
/// EtherType for IPv6
pub const ETH_TYPE_IPV6: u16 = 0x86DD;
/// EtherType for 802.1Q VLAN tag
pub const ETH_TYPE_VLAN: u16 = 0x8100;

const ETH_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;

/// Single match criterion of a traffic selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Criterion {
    /// Match on EtherType
    EthType(u16),
    /// Match on source IP prefix
    IpSrc(IpNetwork),
    /// Match on destination IP prefix
    IpDst(IpNetwork),
}

/// Normalized flow identity: EtherType plus host-prefix source/destination
///
/// Two keys built from the same addresses always compare and hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    /// EtherType
    pub eth_type: u16,
    /// Source host prefix (/32 or /128)
    pub ip_src: IpNetwork,
    /// Destination host prefix (/32 or /128)
    pub ip_dst: IpNetwork,
}

impl FlowKey {
    /// Create from an IPv4 pair
    #[inline]
    pub fn from_v4(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            eth_type: ETH_TYPE_IPV4,
            ip_src: IpNetwork::from(IpAddr::V4(src)),
            ip_dst: IpNetwork::from(IpAddr::V4(dst)),
        }
    }

    /// Selector criteria equivalent to this key
    pub fn criteria(&self) -> [Criterion; 3] {
        [
            Criterion::EthType(self.eth_type),
            Criterion::IpSrc(self.ip_src),
            Criterion::IpDst(self.ip_dst),
        ]
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ETH_TYPE:0x{:04x} IP_SRC:{} IP_DST:{}",
            self.eth_type, self.ip_src, self.ip_dst
        )
    }
}

/// Network-layer fields of a parsed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpHeaders {
    /// Source address
    pub src: IpAddr,
    /// Destination address
    pub dst: IpAddr,
    /// IP protocol / next header
    pub protocol: u8,
}

/// Parsed frame headers relevant to reactive forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeaders {
    /// Destination MAC
    pub dst_mac: MacAddr,
    /// Source MAC
    pub src_mac: MacAddr,
    /// VLAN id if the frame carries one 802.1Q tag
    pub vlan: Option<u16>,
    /// EtherType after any VLAN tag
    pub eth_type: u16,
    /// IP headers for IPv4/IPv6 frames
    pub ip: Option<IpHeaders>,
}

impl PacketHeaders {
    /// Parse from raw packet (Ethernet frame)
    ///
    /// Non-IP frames parse successfully with `ip == None`; truncated or
    /// inconsistent IP headers are rejected.
    pub fn parse(data: &[u8]) -> RoutingResult<Self> {
        if data.len() < ETH_HEADER_LEN {
            return Err(RoutingError::MalformedPacket(format!(
                "frame of {} bytes shorter than Ethernet header",
                data.len()
            )));
        }

        let dst_mac = MacAddr(mac_at(data, 0));
        let src_mac = MacAddr(mac_at(data, 6));
        let mut eth_type = u16::from_be_bytes([data[12], data[13]]);
        let mut offset = ETH_HEADER_LEN;
        let mut vlan = None;

        if eth_type == ETH_TYPE_VLAN {
            if data.len() < ETH_HEADER_LEN + VLAN_TAG_LEN {
                return Err(RoutingError::MalformedPacket("truncated VLAN tag".into()));
            }
            vlan = Some(u16::from_be_bytes([data[14], data[15]]) & 0x0fff);
            eth_type = u16::from_be_bytes([data[16], data[17]]);
            offset += VLAN_TAG_LEN;
        }

        let ip = match eth_type {
            ETH_TYPE_IPV4 => Some(Self::parse_ipv4(&data[offset..])?),
            ETH_TYPE_IPV6 => Some(Self::parse_ipv6(&data[offset..])?),
            _ => None,
        };

        Ok(Self {
            dst_mac,
            src_mac,
            vlan,
            eth_type,
            ip,
        })
    }

    /// Flow key for IP frames
    pub fn flow_key(&self) -> Option<FlowKey> {
        self.ip.map(|ip| FlowKey {
            eth_type: self.eth_type,
            ip_src: IpNetwork::from(ip.src),
            ip_dst: IpNetwork::from(ip.dst),
        })
    }

    fn parse_ipv4(data: &[u8]) -> RoutingResult<IpHeaders> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(RoutingError::MalformedPacket("truncated IPv4 header".into()));
        }
        let version = data[0] >> 4;
        let ihl = ((data[0] & 0x0f) as usize) * 4;
        if version != 4 || ihl < IPV4_MIN_HEADER_LEN || data.len() < ihl {
            return Err(RoutingError::MalformedPacket(format!(
                "bad IPv4 header (version {version}, ihl {ihl})"
            )));
        }

        Ok(IpHeaders {
            src: IpAddr::V4(Ipv4Addr::new(data[12], data[13], data[14], data[15])),
            dst: IpAddr::V4(Ipv4Addr::new(data[16], data[17], data[18], data[19])),
            protocol: data[9],
        })
    }

    fn parse_ipv6(data: &[u8]) -> RoutingResult<IpHeaders> {
        if data.len() < IPV6_HEADER_LEN {
            return Err(RoutingError::MalformedPacket("truncated IPv6 header".into()));
        }
        if data[0] >> 4 != 6 {
            return Err(RoutingError::MalformedPacket("bad IPv6 version".into()));
        }

        let mut src = [0u8; 16];
        let mut dst = [0u8; 16];
        src.copy_from_slice(&data[8..24]);
        dst.copy_from_slice(&data[24..40]);

        Ok(IpHeaders {
            src: IpAddr::V6(Ipv6Addr::from(src)),
            dst: IpAddr::V6(Ipv6Addr::from(dst)),
            protocol: data[6],
        })
    }
}

#[inline(always)]
fn mac_at(data: &[u8], at: usize) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[at..at + 6]);
    mac
}

/// Build a minimal untagged Ethernet + IPv4 frame (8 byte zero payload)
pub fn build_ipv4_frame(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
) -> Vec<u8> {
    let total_len = (IPV4_MIN_HEADER_LEN + 8) as u16;
    let mut frame = Vec::with_capacity(ETH_HEADER_LEN + total_len as usize);
    frame.extend_from_slice(&dst_mac.0);
    frame.extend_from_slice(&src_mac.0);
    frame.extend_from_slice(&ETH_TYPE_IPV4.to_be_bytes());
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&total_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // id, flags, frag
    frame.extend_from_slice(&[0x40, protocol, 0x00, 0x00]); // ttl, proto, checksum
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&[0u8; 8]);
    frame
}
