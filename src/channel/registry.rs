//! Named collection of independent channels.
//!
//! [`ChannelRegistry`] composes several channels (one per mini-game, one per
//! controlled character, ...) plus at most one receive-only broadcast
//! channel. Channels share nothing but the event bus; failure, backoff and
//! queueing in one never affect another.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::client::Channel;
use super::settings::ChannelSettings;
use super::transport::Connector;
use crate::domain::{ChannelRole, ChannelSnapshot, ChannelSummary, EventBus};
use crate::error::ChannelError;

/// Central store for all running channels, keyed by name.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: RwLock<BTreeMap<String, Channel>>,
    connector: Arc<dyn Connector>,
    bus: EventBus,
}

impl ChannelRegistry {
    /// Creates an empty registry whose channels connect through
    /// `connector` and publish on `bus`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, bus: EventBus) -> Self {
        Self {
            channels: RwLock::new(BTreeMap::new()),
            connector,
            bus,
        }
    }

    /// Starts a channel and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::DuplicateChannel`] if the name is taken and
    /// [`ChannelError::InvalidConfig`] for a second broadcast channel.
    pub async fn open(&self, settings: ChannelSettings) -> Result<Channel, ChannelError> {
        let mut map = self.channels.write().await;
        if map.contains_key(&settings.name) {
            return Err(ChannelError::DuplicateChannel(settings.name));
        }
        if settings.role == ChannelRole::Broadcast
            && map.values().any(|c| c.role() == ChannelRole::Broadcast)
        {
            return Err(ChannelError::InvalidConfig(
                "only one broadcast channel is supported".to_string(),
            ));
        }
        let channel = Channel::spawn(settings, Arc::clone(&self.connector), self.bus.clone());
        map.insert(channel.name().to_string(), channel.clone());
        tracing::info!(channel = %channel.name(), role = ?channel.role(), "channel registered");
        Ok(channel)
    }

    /// Returns a handle to the named channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownChannel`] if no channel has that name.
    pub async fn get(&self, name: &str) -> Result<Channel, ChannelError> {
        let map = self.channels.read().await;
        map.get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Returns the broadcast channel, if one is registered.
    pub async fn broadcast(&self) -> Option<Channel> {
        let map = self.channels.read().await;
        map.values()
            .find(|c| c.role() == ChannelRole::Broadcast)
            .cloned()
    }

    /// Tears down and unregisters the named channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownChannel`] if no channel has that name.
    pub async fn remove(&self, name: &str) -> Result<ChannelSnapshot, ChannelError> {
        let channel = self
            .channels
            .write()
            .await
            .remove(name)
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))?;
        channel.shutdown().await;
        Ok(channel.snapshot())
    }

    /// Returns summaries of all channels, ordered by name.
    pub async fn list(&self) -> Vec<ChannelSummary> {
        let map = self.channels.read().await;
        map.values()
            .map(|c| ChannelSummary::from(&c.snapshot()))
            .collect()
    }

    /// Returns the number of registered channels.
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Returns `true` if no channel is registered.
    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    /// Tears down every channel and empties the registry.
    pub async fn shutdown_all(&self) {
        let drained = std::mem::take(&mut *self.channels.write().await);
        for channel in drained.values() {
            channel.shutdown().await;
        }
    }
}
