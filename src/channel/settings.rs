//! Per-channel settings.

use std::time::Duration;

use crate::domain::event_log::DEFAULT_LOG_CAPACITY;
use crate::domain::{Backoff, ChannelRole, Endpoint};

/// Default time an issued action may stay pending without a reply.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(6_000);

/// Everything a [`super::Channel`] needs to run.
///
/// Built with [`ChannelSettings::new`] and the `with_*` methods; the
/// defaults match the reference control panel (500 ms base backoff growing
/// by 1.6 up to 5 s, 6 s action timeout, 50 log entries, auto-reconnect on).
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Channel name, unique within a registry.
    pub name: String,
    /// Remote endpoint.
    pub endpoint: Endpoint,
    /// Control or receive-only broadcast.
    pub role: ChannelRole,
    /// Message-type namespace owned by this channel, e.g. `"crates"` for
    /// `crates:status`. `None` accepts any namespace.
    pub domain: Option<String>,
    /// Reconnect backoff policy.
    pub backoff: Backoff,
    /// How long an issued action may stay pending.
    pub action_timeout: Duration,
    /// Event log capacity.
    pub log_capacity: usize,
    /// Whether a closed transport is replaced automatically.
    pub auto_reconnect: bool,
    /// Field used for explicit request/reply correlation, if the server
    /// echoes one.
    pub correlation_field: Option<String>,
    /// Command `type` sent right after each successful open to ask the
    /// server for its current state.
    pub status_request: Option<String>,
}

impl ChannelSettings {
    /// Creates control-channel settings with default timings.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            role: ChannelRole::Control,
            domain: None,
            backoff: Backoff::default(),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            log_capacity: DEFAULT_LOG_CAPACITY,
            auto_reconnect: true,
            correlation_field: None,
            status_request: None,
        }
    }

    /// Marks the channel receive-only.
    #[must_use]
    pub fn broadcast(mut self) -> Self {
        self.role = ChannelRole::Broadcast;
        self
    }

    /// Sets the message-type namespace.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the reconnect backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the action timeout.
    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Sets the event log capacity.
    #[must_use]
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Enables or disables automatic reconnection.
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Enables explicit correlation through `field`.
    #[must_use]
    pub fn with_correlation_field(mut self, field: impl Into<String>) -> Self {
        self.correlation_field = Some(field.into());
        self
    }

    /// Sends `{type: kind}` after every successful open.
    #[must_use]
    pub fn with_status_request(mut self, kind: impl Into<String>) -> Self {
        self.status_request = Some(kind.into());
        self
    }
}
