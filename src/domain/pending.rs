//! Pending-action tag: the single in-flight command a channel is waiting on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Marker for the command currently "in flight" from the operator's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PendingAction {
    /// Kind of action, e.g. `"pick"`, `"reset"`, `"voice"`.
    pub tag: String,
    /// When the action was issued.
    pub issued_at: DateTime<Utc>,
    /// Correlation id stamped into the outbound command, if the channel
    /// uses explicit correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Tag of a still-pending action this one replaced. A reply clearing
    /// this action may belong to that earlier one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded: Option<String>,
}

impl PendingAction {
    /// Creates a pending action issued now.
    #[must_use]
    pub fn new(tag: impl Into<String>, correlation_id: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            issued_at: Utc::now(),
            correlation_id,
            superseded: None,
        }
    }

    /// Records that this action replaced `previous` before it completed.
    #[must_use]
    pub fn superseding(mut self, previous: Option<&PendingAction>) -> Self {
        self.superseded = previous.map(|p| p.tag.clone());
        self
    }

    /// Returns `true` if `id` is this action's correlation id.
    #[must_use]
    pub fn matches_correlation(&self, id: &str) -> bool {
        self.correlation_id.as_deref() == Some(id)
    }
}
