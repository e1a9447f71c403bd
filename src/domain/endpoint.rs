//! Remote endpoint identity: WebSocket URL plus optional sub-protocols.

use std::fmt;

use serde::Serialize;
use tokio_tungstenite::tungstenite::http::Uri;
use utoipa::ToSchema;

use crate::error::ChannelError;

/// Identity of the command endpoint a channel connects to.
///
/// The URL is validated once at construction: it must parse as a URI with
/// a `ws` or `wss` scheme and a non-empty authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Endpoint {
    url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    protocols: Vec<String>,
}

impl Endpoint {
    /// Creates an endpoint for `url` with no sub-protocols.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidEndpoint`] if `url` is not a
    /// `ws://` or `wss://` URL with a host.
    pub fn new(url: impl Into<String>) -> Result<Self, ChannelError> {
        let url = url.into();
        validate(&url)?;
        Ok(Self {
            url,
            protocols: Vec::new(),
        })
    }

    /// Sets the sub-protocols offered in the opening handshake.
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
        self
    }

    /// Appends a `key=value` query parameter.
    ///
    /// Used to bind one physical connection to a controlled entity, e.g.
    /// `?character=2`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidEndpoint`] if the resulting URL no
    /// longer parses.
    pub fn with_query(self, key: &str, value: impl fmt::Display) -> Result<Self, ChannelError> {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        let url = format!("{}{sep}{key}={value}", self.url);
        validate(&url)?;
        Ok(Self { url, ..self })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the sub-protocols, possibly empty.
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Returns `true` for `wss://` endpoints.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn validate(url: &str) -> Result<(), ChannelError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| ChannelError::InvalidEndpoint(format!("{url}: {e}")))?;
    match uri.scheme_str() {
        Some("ws" | "wss") => {}
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "{url}: unsupported scheme {}",
                other.unwrap_or("<none>")
            )));
        }
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(ChannelError::InvalidEndpoint(format!("{url}: missing host")));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ws_and_wss() {
        assert!(Endpoint::new("ws://localhost:8000/ws/crates").is_ok());
        let Ok(secure) = Endpoint::new("wss://control.example.com/ws") else {
            panic!("wss endpoint should parse");
        };
        assert!(secure.is_secure());
    }

    #[test]
    fn rejects_http_scheme() {
        let result = Endpoint::new("http://localhost:8000/ws");
        assert!(matches!(result, Err(ChannelError::InvalidEndpoint(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Endpoint::new("not a url").is_err());
        assert!(Endpoint::new("").is_err());
    }

    #[test]
    fn query_parameters_append() {
        let Ok(ep) = Endpoint::new("ws://localhost:8000/ws/character_control") else {
            panic!("valid endpoint");
        };
        let Ok(ep) = ep.with_query("character", 2) else {
            panic!("valid query");
        };
        assert_eq!(ep.url(), "ws://localhost:8000/ws/character_control?character=2");
        let Ok(ep) = ep.with_query("platform", "twitch") else {
            panic!("valid query");
        };
        assert!(ep.url().ends_with("?character=2&platform=twitch"));
    }

    #[test]
    fn blank_protocols_are_dropped() {
        let Ok(ep) = Endpoint::new("ws://localhost/ws") else {
            panic!("valid endpoint");
        };
        let ep = ep.with_protocols(["control.v1", " ", ""]);
        assert_eq!(ep.protocols(), ["control.v1".to_string()]);
    }
}
