//! Cached/returned response body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Body of a gateway response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// Parsed JSON from an operation with expected fields.
    Structured(Value),
    /// Raw model text (unvalidated operations, or unparseable output).
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Structured(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Structured(_) => None,
        }
    }

    /// Deserialize a structured payload into `T`.
    ///
    /// Text payloads are parsed as JSON first.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Structured(v) => Ok(T::deserialize(v)?),
            Payload::Text(s) => Ok(serde_json::from_str(s)?),
        }
    }
}
