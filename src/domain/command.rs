//! Outbound commands.
//!
//! A [`Command`] is a JSON object with a string `type` discriminator and
//! arbitrary extra fields. Related command kinds for one controlled entity
//! share a connection and are told apart by their fields, e.g.
//! `{"type":"character:pick","character_number":2,"platform":"twitch"}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChannelError;

/// Structured command payload sent to the control server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Command(Map<String, Value>);

impl Command {
    /// Creates a command with the given `type`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(kind.into()));
        Self(map)
    }

    /// Adds or replaces a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a field in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the command's `type`.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Serializes the command to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl TryFrom<Value> for Command {
    type Error = ChannelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(ChannelError::InvalidCommand(
                "command must be a JSON object".to_string(),
            ));
        };
        match map.get("type") {
            Some(Value::String(kind)) if !kind.trim().is_empty() => Ok(Self(map)),
            _ => Err(ChannelError::InvalidCommand(
                "command needs a non-empty string `type`".to_string(),
            )),
        }
    }
}

impl From<Command> for Value {
    fn from(command: Command) -> Self {
        Self::Object(command.0)
    }
}
