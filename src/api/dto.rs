//! Data Transfer Objects for REST request/response serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::channel::SendOutcome;
use crate::domain::ChannelSummary;

/// Body of `POST /api/v1/channels/{name}/commands`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitCommandRequest {
    /// Pending-action tag. When present the command is issued as a
    /// tracked action with a recovery timeout.
    #[serde(default)]
    pub action: Option<String>,
    /// Outbound command object; must carry a string `type`.
    #[schema(value_type = Object)]
    pub command: Value,
}

/// Result of a command submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitCommandResponse {
    /// Channel the command was submitted to.
    pub channel: String,
    /// Whether the command went out now or was queued.
    pub outcome: SendOutcome,
    /// Pending tag after the submission, if any.
    pub pending: Option<String>,
}

/// Response of `GET /api/v1/channels`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelListResponse {
    /// Summaries ordered by channel name.
    pub channels: Vec<ChannelSummary>,
    /// Number of channels.
    pub total: usize,
}
