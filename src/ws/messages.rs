//! WebSocket message types: envelope and subscription commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Top-level server-to-client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Echo of the request ID for responses; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Server → Client acknowledgement of a command.
    Response,
    /// Server → Client channel event.
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    /// Wraps a channel event.
    #[must_use]
    pub fn event(payload: Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload)
    }

    /// Acknowledges the request with ID `id`.
    #[must_use]
    pub fn response(id: impl Into<String>, payload: Value) -> Self {
        Self::new(id.into(), WsMessageType::Response, payload)
    }

    /// Reports a failed request.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u16, message: &str) -> Self {
        Self::new(
            id.into(),
            WsMessageType::Error,
            json!({ "code": code, "message": message }),
        )
    }

    fn new(id: String, msg_type: WsMessageType, payload: Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Client-to-server request: a command plus an optional request ID.
#[derive(Debug, Clone, Deserialize)]
pub struct WsRequest {
    /// Client-chosen ID echoed in the response.
    #[serde(default)]
    pub id: String,
    /// The command itself.
    #[serde(flatten)]
    pub command: WsCommand,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Follow events of the named channels. `["*"]` follows all.
    Subscribe {
        /// Channel names.
        channels: Vec<String>,
    },
    /// Stop following the named channels.
    Unsubscribe {
        /// Channel names.
        channels: Vec<String>,
    },
}
