//! The validated models payload.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{GatewayError, Result};

/// Raw bytes of one models listing, validated as a JSON object.
///
/// Immutable once built and cheap to clone: every clone shares the same
/// allocation, so handing a blob to many readers copies a pointer only.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelsBlob {
    bytes: Arc<[u8]>,
}

impl ModelsBlob {
    /// Validate `bytes` as a JSON object and wrap them verbatim.
    ///
    /// The upstream contract is an object (`{"data": [...], ...}`); arrays,
    /// scalars and malformed JSON are rejected with
    /// [`GatewayError::InvalidPayload`].
    pub fn parse(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(_)) => Ok(Self {
                bytes: bytes.into(),
            }),
            Ok(other) => Err(GatewayError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(GatewayError::InvalidPayload(e.to_string())),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parse into a generic JSON value.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::from_slice(&self.bytes).map_err(|e| GatewayError::InvalidPayload(e.to_string()))
    }

    /// Model ids listed under `data[].id`, in upstream order.
    ///
    /// Entries without a string `id` are skipped.
    pub fn model_ids(&self) -> Vec<String> {
        let Ok(value) = self.to_value() else {
            return Vec::new();
        };
        value
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AsRef<[u8]> for ModelsBlob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ModelsBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelsBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
