//! Console configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Channels are declared in
//! `CONTROL_CHANNELS` as comma-separated `name[:domain]@url` entries, e.g.
//!
//! ```text
//! CONTROL_CHANNELS=crates@ws://localhost:8000/ws/crates,character-1:character@ws://localhost:8000/ws/character_control?character=1
//! CONTROL_BROADCAST_URL=ws://localhost:8000/ws/overlay/stream1
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::channel::ChannelSettings;
use crate::domain::event_bus::DEFAULT_BUS_CAPACITY;
use crate::domain::event_log::DEFAULT_LOG_CAPACITY;
use crate::domain::{Backoff, Endpoint};
use crate::error::ChannelError;

/// Name given to the channel built from `CONTROL_BROADCAST_URL`.
pub const BROADCAST_CHANNEL_NAME: &str = "broadcast";

/// Top-level console configuration.
///
/// Loaded once at startup via [`ConsoleConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Socket address the console HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Channels to open at startup, broadcast channel included.
    pub channels: Vec<ChannelSettings>,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl ConsoleConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidConfig`] if `LISTEN_ADDR` or a
    /// channel entry cannot be parsed.
    pub fn from_env() -> Result<Self, ChannelError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ConsoleConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChannelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3100".to_string())
            .parse()
            .map_err(|e| ChannelError::InvalidConfig(format!("LISTEN_ADDR: {e}")))?;

        let backoff = Backoff::new(
            parse_var(&lookup, "RECONNECT_BASE_MS", 500),
            parse_var(&lookup, "RECONNECT_GROWTH", 1.6),
            parse_var(&lookup, "RECONNECT_CAP_MS", 5_000),
        );
        let action_timeout = Duration::from_millis(parse_var(&lookup, "ACTION_TIMEOUT_MS", 6_000));
        let log_capacity = parse_var(&lookup, "EVENT_LOG_CAPACITY", DEFAULT_LOG_CAPACITY);
        let auto_reconnect = parse_bool(&lookup, "AUTO_RECONNECT", true);
        let correlation_field = lookup("CORRELATION_FIELD").filter(|f| !f.trim().is_empty());
        let status_suffix = lookup("STATUS_REQUEST_SUFFIX")
            .unwrap_or_else(|| "status:get".to_string());
        let protocols: Vec<String> = lookup("CONTROL_PROTOCOLS")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let apply = |settings: ChannelSettings| {
            let mut settings = settings
                .with_backoff(backoff)
                .with_action_timeout(action_timeout)
                .with_log_capacity(log_capacity)
                .with_auto_reconnect(auto_reconnect);
            if let Some(field) = &correlation_field {
                settings = settings.with_correlation_field(field.clone());
            }
            settings
        };

        let mut channels = Vec::new();
        for entry in lookup("CONTROL_CHANNELS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            let parsed = ChannelEntry::parse(entry)?;
            let endpoint = Endpoint::new(parsed.url)?.with_protocols(protocols.iter().cloned());
            let mut settings = ChannelSettings::new(parsed.name, endpoint).with_domain(parsed.domain);
            if !status_suffix.trim().is_empty() {
                settings =
                    settings.with_status_request(format!("{}:{status_suffix}", parsed.domain));
            }
            channels.push(apply(settings));
        }

        if let Some(url) = lookup("CONTROL_BROADCAST_URL").filter(|u| !u.trim().is_empty()) {
            let endpoint = Endpoint::new(url)?.with_protocols(protocols.iter().cloned());
            channels.push(apply(
                ChannelSettings::new(BROADCAST_CHANNEL_NAME, endpoint).broadcast(),
            ));
        }

        let event_bus_capacity = parse_var(&lookup, "EVENT_BUS_CAPACITY", DEFAULT_BUS_CAPACITY);
        let log_json = lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        Ok(Self {
            listen_addr,
            channels,
            event_bus_capacity,
            log_json,
        })
    }
}

/// One parsed `name[:domain]@url` entry.
#[derive(Debug, PartialEq, Eq)]
struct ChannelEntry<'a> {
    name: &'a str,
    domain: &'a str,
    url: &'a str,
}

impl<'a> ChannelEntry<'a> {
    fn parse(entry: &'a str) -> Result<Self, ChannelError> {
        let (label, url) = entry.split_once('@').ok_or_else(|| {
            ChannelError::InvalidConfig(format!("channel entry `{entry}` needs name@url"))
        })?;
        let (name, domain) = label.split_once(':').unwrap_or((label, label));
        let (name, domain) = (name.trim(), domain.trim());
        if name.is_empty() || domain.is_empty() {
            return Err(ChannelError::InvalidConfig(format!(
                "channel entry `{entry}` has an empty name or domain"
            )));
        }
        Ok(Self {
            name,
            domain,
            url: url.trim(),
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
