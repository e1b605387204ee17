//! Reactive Path Installation
//!
//! Turns inbound-traffic trigger events into one load-balanced path intent
//! per distinct flow.
//!
//! # Features
//!
//! - Atomic per-flow reservation (no duplicate installs under concurrency)
//! - Bounded concurrent event dispatch
//! - Explicit start/stop lifecycle with full intent cleanup

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod intent;
pub mod packet;
pub mod processor;

pub use cache::{FlowCache, Reservation, Reserve};
pub use config::{RoutingConfig, DEFAULT_INTENT_PRIORITY};
pub use engine::{start, EngineDeps, EngineHandle, Event, EventSender, TeardownReport};
pub use intent::{InMemoryIntentService, IntentId, IntentService, IntentState, PathIntent};
pub use packet::{DefaultPacketContext, InboundPacket, PacketContext};
pub use processor::{ForwarderStats, ForwarderStatsSnapshot, ProcessOutcome, ReactiveForwarder};
