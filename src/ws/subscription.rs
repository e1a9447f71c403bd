//! Per-connection subscription manager.
//!
//! Tracks which channel names a WebSocket client follows and provides
//! server-side event filtering.

use std::collections::BTreeSet;

/// Wildcard entry that follows every channel.
pub const WILDCARD: &str = "*";

/// Manages the set of channel subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed channel names. Ignored while `subscribe_all` is set.
    channels: BTreeSet<String>,
    /// Whether the client follows all channels.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channel names. `"*"` enables the wildcard.
    pub fn subscribe<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if name == WILDCARD {
                self.subscribe_all = true;
            } else if !name.is_empty() {
                self.channels.insert(name.to_string());
            }
        }
    }

    /// Removes channel names. `"*"` disables the wildcard.
    pub fn unsubscribe<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if name == WILDCARD {
                self.subscribe_all = false;
            } else {
                self.channels.remove(name);
            }
        }
    }

    /// Returns `true` if events of `channel` should be forwarded.
    #[must_use]
    pub fn matches(&self, channel: &str) -> bool {
        self.subscribe_all || self.channels.contains(channel)
    }

    /// Explicitly subscribed channel names, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches("crates"));
    }

    #[test]
    fn subscribe_specific_channel() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["crates"]);
        assert!(mgr.matches("crates"));
        assert!(!mgr.matches("polls"));
    }

    #[test]
    fn wildcard_matches_everything_until_removed() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["*", "polls"]);
        assert!(mgr.matches("crates"));
        assert!(mgr.is_subscribed_all());

        mgr.unsubscribe(["*"]);
        assert!(!mgr.matches("crates"));
        assert!(mgr.matches("polls"));
    }

    #[test]
    fn unsubscribe_removes_channel() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(["crates", "character-1", " "]);
        assert_eq!(mgr.channels(), ["character-1", "crates"]);
        mgr.unsubscribe(["crates"]);
        assert!(!mgr.matches("crates"));
        assert_eq!(mgr.channels(), ["character-1"]);
    }
}
