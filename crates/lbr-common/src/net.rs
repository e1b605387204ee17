//! Network element identifiers
//!
//! Textual forms follow the controller conventions: devices are opaque
//! strings (`of:0000000000000001`), connect points are `device/port`, MAC
//! addresses are colon-separated hex.

use crate::{RoutingError, RoutingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of an infrastructure device (switch)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Port number on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(pub u64);

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A port on a specific device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectPoint {
    /// Owning device
    pub device: DeviceId,
    /// Port on the device
    pub port: PortNumber,
}

impl ConnectPoint {
    /// Create a connect point
    pub fn new(device: impl Into<DeviceId>, port: u64) -> Self {
        Self {
            device: device.into(),
            port: PortNumber(port),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

impl FromStr for ConnectPoint {
    type Err = RoutingError;

    fn from_str(s: &str) -> RoutingResult<Self> {
        let (device, port) = s
            .rsplit_once('/')
            .ok_or_else(|| RoutingError::InvalidIdentifier(format!("connect point {s:?}")))?;
        if device.is_empty() {
            return Err(RoutingError::InvalidIdentifier(format!("connect point {s:?}")));
        }
        let port = port
            .parse::<u64>()
            .map_err(|_| RoutingError::InvalidIdentifier(format!("port in {s:?}")))?;
        Ok(Self::new(device, port))
    }
}

impl TryFrom<String> for ConnectPoint {
    type Error = RoutingError;

    fn try_from(s: String) -> RoutingResult<Self> {
        s.parse()
    }
}

impl From<ConnectPoint> for String {
    fn from(cp: ConnectPoint) -> Self {
        cp.to_string()
    }
}

/// 48-bit Ethernet MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Broadcast address
    pub const BROADCAST: Self = Self([0xff; 6]);

    /// Whether the group bit is set
    #[inline]
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = RoutingError;

    fn from_str(s: &str) -> RoutingResult<Self> {
        let invalid = || RoutingError::InvalidIdentifier(format!("mac {s:?}"));
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = RoutingError;

    fn try_from(s: String) -> RoutingResult<Self> {
        s.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

/// End-host identifier (untagged MAC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub MacAddr);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/None", self.0)
    }
}

/// Any addressable element of the topology
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementId {
    /// Infrastructure device
    Device(DeviceId),
    /// End host
    Host(HostId),
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(d) => d.fmt(f),
            Self::Host(h) => h.fmt(f),
        }
    }
}

impl From<DeviceId> for ElementId {
    fn from(d: DeviceId) -> Self {
        Self::Device(d)
    }
}

impl From<HostId> for ElementId {
    fn from(h: HostId) -> Self {
        Self::Host(h)
    }
}
