//! One NDJSON output line.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single, fully parsed JSON object destined for one NDJSON line.
///
/// Frames coming from the upstream server keep every field it sent, in the
/// order it sent them. Frames synthesised here (recovery, error) carry only
/// the fields named by their constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(Map<String, Value>);

impl Frame {
    /// Parse `text` as exactly one JSON object. Anything else (arrays, scalars,
    /// trailing data, incomplete input) yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<Map<String, Value>>(text).ok().map(Self)
    }

    /// The frame emitted when the stream ends with bytes that never formed a
    /// complete object.
    pub fn recovery(text: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("response".into(), Value::String(text.into()));
        map.insert("done".into(), Value::Bool(true));
        Self(map)
    }

    /// A terminal error frame: `{"error": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".into(), Value::String(message.into()));
        Self(map)
    }

    pub fn is_done(&self) -> bool {
        self.0.get("done").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// The text fragment carried by this frame, if any.
    pub fn response(&self) -> Option<&str> {
        self.0.get("response").and_then(Value::as_str)
    }

    /// Insert (or replace) a top-level field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The frame serialised as one newline-terminated NDJSON line.
    pub fn to_ndjson(&self) -> String {
        format!("{self}\n")
    }
}

impl From<Map<String, Value>> for Frame {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}
