//! Control channel error types with HTTP status code mapping.
//!
//! [`ChannelError`] is the central error type of the crate. The channel
//! runtime never surfaces most of these to callers (transport failures
//! degrade to "stay disconnected and retry"), but construction, send and
//! console requests do. Each variant maps to a status code and structured
//! JSON error response for the console API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "unknown channel: crates",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error enum for channel construction, sends and console requests.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Transport       | 502 Bad Gateway / 500        |
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Endpoint URL is not a usable `ws://` or `wss://` URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Outbound command is not a JSON object with a string `type`.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No channel is registered under the given name.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// A channel with this name is already registered.
    #[error("channel already registered: {0}")]
    DuplicateChannel(String),

    /// The channel only receives pushed state and cannot send.
    #[error("channel {0} is receive-only")]
    ReceiveOnly(String),

    /// The channel has been torn down.
    #[error("channel {0} has been shut down")]
    ShutDown(String),

    /// The transport could not be constructed.
    #[error("transport construction failed: {0}")]
    Connect(String),

    /// WebSocket protocol or I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChannelError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidEndpoint(_) => 1001,
            Self::InvalidCommand(_) => 1002,
            Self::InvalidConfig(_) => 1003,
            Self::UnknownChannel(_) => 2001,
            Self::DuplicateChannel(_) => 2002,
            Self::ReceiveOnly(_) => 2003,
            Self::ShutDown(_) => 2004,
            Self::Connect(_) => 3001,
            Self::Transport(_) => 3002,
            Self::Serialization(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidEndpoint(_) | Self::InvalidCommand(_) | Self::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownChannel(_) => StatusCode::NOT_FOUND,
            Self::DuplicateChannel(_) | Self::ReceiveOnly(_) | Self::ShutDown(_) => {
                StatusCode::CONFLICT
            }
            Self::Connect(_) | Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
