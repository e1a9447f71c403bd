//! Inbound message classification and heuristic reply correlation.
//!
//! The control protocol has no request ids, so a pending action counts as
//! complete when any recognizable reply arrives: an `ok`/`error` signal, a
//! message namespaced under the channel's domain, a message with a `status`
//! string, or one naming an identity (`username`, `user` or `name`). When a
//! correlation field is configured and the server echoes it, matching is
//! exact instead.

use serde_json::{Map, Value};

/// Fields that carry the identity a channel tracks, in lookup order.
const IDENTITY_FIELDS: [&str; 3] = ["username", "user", "name"];

/// Shape of an inbound server object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `{type:"ok", message?}`.
    Ack,
    /// `{type:"error", message}`.
    ServerError,
    /// `{type:"<domain>:status", active, ...}`.
    DomainStatus {
        /// Whether the game or feature is active, when reported.
        active: Option<bool>,
    },
    /// `{type:"<domain>:result", message, ...}`.
    DomainResult,
    /// Any other `{type:"<domain>:..."}`.
    DomainEvent {
        /// The full `type` value.
        kind: String,
    },
    /// Object with a `status` string.
    Status {
        /// The status value.
        status: String,
    },
    /// Object naming an identity.
    Identity,
    /// Nothing the dispatcher recognizes.
    Unrecognized,
}

impl InboundKind {
    /// Returns `true` if this shape completes a pending action.
    #[must_use]
    pub fn completes_pending(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// A parsed inbound object with everything the dispatcher needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Classification.
    pub kind: InboundKind,
    /// `message` field, if a string.
    pub message: Option<String>,
    /// Identity named by the message.
    pub identity: Option<String>,
    /// `true` if the message acknowledges a reset of the tracked identity.
    pub reset: bool,
    /// Value of the configured correlation field, if present.
    pub correlation: Option<String>,
    /// The object as received.
    pub payload: Value,
}

impl Inbound {
    /// One-line description for the event log.
    #[must_use]
    pub fn describe(&self) -> String {
        let message = self.message.as_deref();
        match (&self.kind, message) {
            (InboundKind::Ack, Some(m)) => format!("ok: {m}"),
            (InboundKind::Ack, None) => "ok".to_string(),
            (InboundKind::ServerError, m) => format!("server error: {}", m.unwrap_or("unspecified")),
            (InboundKind::DomainStatus { active }, m) => {
                let state = match active {
                    Some(true) => "active",
                    Some(false) => "inactive",
                    None => "unknown",
                };
                match m {
                    Some(m) => format!("status: {state} ({m})"),
                    None => format!("status: {state}"),
                }
            }
            (InboundKind::DomainResult, m) => format!("result: {}", m.unwrap_or("-")),
            (InboundKind::DomainEvent { kind }, Some(m)) => format!("{kind}: {m}"),
            (InboundKind::DomainEvent { kind }, None) => kind.clone(),
            (InboundKind::Status { status }, _) => format!("status: {status}"),
            (InboundKind::Identity, _) => {
                format!("identity: {}", self.identity.as_deref().unwrap_or_default())
            }
            (InboundKind::Unrecognized, _) => format!("message: {}", self.payload),
        }
    }
}

/// Raised for frames that are not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed;

/// Classifies inbound frames for one channel.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    domain: Option<String>,
    correlation_field: Option<String>,
}

impl Correlator {
    /// Creates a correlator for the given domain and optional correlation
    /// field.
    #[must_use]
    pub fn new(domain: Option<String>, correlation_field: Option<String>) -> Self {
        Self {
            domain,
            correlation_field,
        }
    }

    /// Parses and classifies a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Malformed`] if `text` is not a JSON object.
    pub fn classify(&self, text: &str) -> Result<Inbound, Malformed> {
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) else {
            return Err(Malformed);
        };

        let message = string_field(&object, "message");
        let identity = IDENTITY_FIELDS
            .iter()
            .find_map(|key| string_field(&object, key))
            .filter(|name| !name.trim().is_empty());
        let status = string_field(&object, "status");
        let reset = status
            .as_deref()
            .is_some_and(|s| s.to_ascii_lowercase().contains("reset"));
        let correlation = self
            .correlation_field
            .as_deref()
            .and_then(|field| object.get(field))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let kind = match object.get("type").and_then(Value::as_str) {
            Some("ok") => InboundKind::Ack,
            Some("error") => InboundKind::ServerError,
            Some(kind) if self.in_domain(kind) => match kind.rsplit(':').next() {
                Some("status") => InboundKind::DomainStatus {
                    active: object.get("active").and_then(Value::as_bool),
                },
                Some("result") => InboundKind::DomainResult,
                _ => InboundKind::DomainEvent {
                    kind: kind.to_string(),
                },
            },
            _ => match (&status, &identity) {
                (Some(status), _) => InboundKind::Status {
                    status: status.clone(),
                },
                (None, Some(_)) => InboundKind::Identity,
                (None, None) => InboundKind::Unrecognized,
            },
        };

        Ok(Inbound {
            kind,
            message,
            identity,
            reset,
            correlation,
            payload: Value::Object(object),
        })
    }

    /// Returns `true` if `kind` is namespaced under this channel's domain.
    fn in_domain(&self, kind: &str) -> bool {
        let Some((namespace, rest)) = kind.split_once(':') else {
            return false;
        };
        if rest.is_empty() {
            return false;
        }
        self.domain.as_deref().is_none_or(|domain| domain == namespace)
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}
