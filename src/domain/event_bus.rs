//! Broadcast channel for channel events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every channel
//! publishes its [`ChannelEvent`]s through the bus, and every console
//! WebSocket connection subscribes to receive filtered events.

use tokio::sync::broadcast;

use super::ChannelEvent;

/// Default capacity of the broadcast ring buffer.
pub const DEFAULT_BUS_CAPACITY: usize = 1_024;

/// Broadcast bus for [`ChannelEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers. Publishing never blocks a channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChannelEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
