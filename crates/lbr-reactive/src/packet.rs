//! Inbound trigger events

use bytes::Bytes;
use lbr_common::{ConnectPoint, PacketHeaders, RoutingResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Frame punted to the engine by a switch
#[derive(Debug, Clone)]
pub struct InboundPacket {
    /// Port the frame arrived on
    pub received_from: ConnectPoint,
    /// Raw Ethernet frame
    pub data: Bytes,
}

impl InboundPacket {
    /// Create a packet
    pub fn new(received_from: ConnectPoint, data: impl Into<Bytes>) -> Self {
        Self {
            received_from,
            data: data.into(),
        }
    }

    /// Parse frame headers
    pub fn parsed(&self) -> RoutingResult<PacketHeaders> {
        PacketHeaders::parse(&self.data)
    }
}

/// Trigger event with a shared "handled" mark
///
/// Earlier processing stages may mark the event handled; the engine skips
/// such events and marks everything it consumes.
pub trait PacketContext: Send + Sync {
    /// Received packet
    fn in_packet(&self) -> &InboundPacket;

    /// Whether some stage consumed the event
    fn is_handled(&self) -> bool;

    /// Consume the event; returns false if it was handled already
    fn block(&self) -> bool;
}

/// Plain packet context
#[derive(Debug)]
pub struct DefaultPacketContext {
    packet: InboundPacket,
    handled: AtomicBool,
}

impl DefaultPacketContext {
    /// Wrap a packet
    pub fn new(packet: InboundPacket) -> Self {
        Self {
            packet,
            handled: AtomicBool::new(false),
        }
    }
}

impl PacketContext for DefaultPacketContext {
    fn in_packet(&self) -> &InboundPacket {
        &self.packet
    }

    fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }

    fn block(&self) -> bool {
        !self.handled.swap(true, Ordering::AcqRel)
    }
}
