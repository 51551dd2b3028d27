//! # Document Payload
//!
//! The payload is an arbitrary JSON object. The engine does not interpret
//! it; it only guarantees the value is well-formed and is an object.
//! Absent or explicit `null` payloads become `{}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A well-formed JSON object carried by a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// The empty object `{}`.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Accept a decoded JSON value. `null` becomes `{}`.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Object(map) => Ok(Self(map)),
            Value::Bool(_) => Err(ValidationError::PayloadNotObject("boolean")),
            Value::Number(_) => Err(ValidationError::PayloadNotObject("number")),
            Value::String(_) => Err(ValidationError::PayloadNotObject("string")),
            Value::Array(_) => Err(ValidationError::PayloadNotObject("array")),
        }
    }

    /// Parse raw JSON text. Blank text becomes `{}`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Ok(Self::empty());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;
        Self::from_value(value)
    }

    /// Borrow the object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value for storage.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Whether the object has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
