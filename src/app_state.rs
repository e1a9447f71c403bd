//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::channel::ChannelRegistry;
use crate::domain::EventBus;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Every running control and broadcast channel.
    pub registry: Arc<ChannelRegistry>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
