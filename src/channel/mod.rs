//! Channel layer: the resilient control-channel client.
//!
//! [`Channel`] keeps one logical connection to a command endpoint alive,
//! queues commands issued while disconnected, reconnects with capped
//! backoff, and tracks a single pending action that clears on a
//! recognizable reply, a close, or a timeout. [`ChannelRegistry`] composes
//! several independent channels.

pub mod client;
pub mod correlation;
pub mod queue;
pub mod registry;
pub mod settings;
pub mod transport;

pub use client::{Channel, SendOutcome};
pub use correlation::{Correlator, Inbound, InboundKind};
pub use queue::OutboundQueue;
pub use registry::ChannelRegistry;
pub use settings::ChannelSettings;
pub use transport::{
    Connector, MemoryConnector, TransportEvent, TransportHandle, TransportPeer, WsConnector,
};
