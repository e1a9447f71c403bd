//! Domain layer: channel value types and the event system.
//!
//! Endpoint identity, outbound commands, reconnect backoff, the pending
//! action tag, the bounded event log, connection state snapshots, and the
//! event bus that mirrors every channel's activity to observers.

pub mod backoff;
pub mod channel_event;
pub mod command;
pub mod endpoint;
pub mod event_bus;
pub mod event_log;
pub mod pending;
pub mod state;

pub use backoff::Backoff;
pub use channel_event::ChannelEvent;
pub use command::Command;
pub use endpoint::Endpoint;
pub use event_bus::EventBus;
pub use event_log::{EventLog, LogEntry, LogLevel};
pub use pending::PendingAction;
pub use state::{ChannelRole, ChannelSnapshot, ChannelSummary, ConnectionState};
