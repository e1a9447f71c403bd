//! Channel events published on the [`super::EventBus`].
//!
//! Every log entry, state transition and inbound server object of every
//! channel is mirrored as a [`ChannelEvent`] so observers (the console's
//! WebSocket feed) can follow channels without polling snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{ConnectionState, LogEntry};

/// Observable event emitted by a channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// The channel's connection state changed.
    StateChanged {
        /// Channel name.
        channel: String,
        /// New state.
        state: ConnectionState,
        /// Reconnect attempts in the current failure streak.
        attempt: u32,
        /// Time of the transition.
        timestamp: DateTime<Utc>,
    },

    /// An entry was appended to the channel's event log.
    Logged {
        /// Channel name.
        channel: String,
        /// The appended entry.
        entry: LogEntry,
    },

    /// The server pushed a JSON object.
    ServerMessage {
        /// Channel name.
        channel: String,
        /// The object as received.
        payload: Value,
        /// Whether it completed the pending action.
        completed_pending: bool,
        /// Time of receipt.
        timestamp: DateTime<Utc>,
    },

    /// The pending action was cleared without a reply.
    PendingCleared {
        /// Channel name.
        channel: String,
        /// Tag of the cleared action.
        tag: String,
        /// Why it was cleared: `"timeout"` or `"closed"`.
        reason: &'static str,
        /// Time of clearing.
        timestamp: DateTime<Utc>,
    },
}

impl ChannelEvent {
    /// Returns the name of the channel that emitted this event.
    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            Self::StateChanged { channel, .. }
            | Self::Logged { channel, .. }
            | Self::ServerMessage { channel, .. }
            | Self::PendingCleared { channel, .. } => channel,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Logged { .. } => "logged",
            Self::ServerMessage { .. } => "server_message",
            Self::PendingCleared { .. } => "pending_cleared",
        }
    }
}
