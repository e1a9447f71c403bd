//! Connection state and the observable channel snapshot.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::{Endpoint, LogEntry, PendingAction};

/// Lifecycle state of a channel's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// A transport has been constructed and is establishing.
    Connecting,
    /// The transport is established; sends go straight through.
    Open,
    /// No usable transport; a reconnect is scheduled unless torn down.
    Closed,
}

impl ConnectionState {
    /// Returns the state as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a channel carries commands or only receives pushed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// Sends commands and receives replies.
    #[default]
    Control,
    /// Receive-only; sends are rejected.
    Broadcast,
}

/// Point-in-time view of a channel, published after every processed event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelSnapshot {
    /// Channel name.
    pub name: String,
    /// Remote endpoint.
    pub endpoint: Endpoint,
    /// Control or broadcast.
    pub role: ChannelRole,
    /// Current connection state.
    pub state: ConnectionState,
    /// Reconnect attempts in the current failure streak.
    pub attempt: u32,
    /// Commands waiting for an open transport.
    pub queued: usize,
    /// Action currently awaiting completion.
    pub pending: Option<PendingAction>,
    /// Latest human-readable message pushed by the server.
    pub last_message: Option<String>,
    /// Latest structured object pushed by the server.
    #[schema(value_type = Option<Object>)]
    pub last_state: Option<Value>,
    /// Identity the server reported for this channel (e.g. a picked user).
    pub identity: Option<String>,
    /// Recent log entries, newest first.
    pub log: Vec<LogEntry>,
    /// `true` once the channel has been shut down.
    pub torn_down: bool,
}

impl ChannelSnapshot {
    /// Returns `true` while the channel is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Returns `true` while an action awaits completion.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Snapshot without the log, for listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelSummary {
    /// Channel name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Control or broadcast.
    pub role: ChannelRole,
    /// Current connection state.
    pub state: ConnectionState,
    /// Reconnect attempts in the current failure streak.
    pub attempt: u32,
    /// Commands waiting for an open transport.
    pub queued: usize,
    /// Tag of the pending action, if any.
    pub pending: Option<String>,
    /// Latest human-readable server message.
    pub last_message: Option<String>,
}

impl From<&ChannelSnapshot> for ChannelSummary {
    fn from(snapshot: &ChannelSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            url: snapshot.endpoint.url().to_string(),
            role: snapshot.role,
            state: snapshot.state,
            attempt: snapshot.attempt,
            queued: snapshot.queued,
            pending: snapshot.pending.as_ref().map(|p| p.tag.clone()),
            last_message: snapshot.last_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap_or_default();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }

    #[test]
    fn default_role_is_control() {
        assert_eq!(ChannelRole::default(), ChannelRole::Control);
    }
}
