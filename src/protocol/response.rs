//! RPC results, error objects and payload decoding.

// ============================================================================
// Imports
// ============================================================================

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// ErrorObject
// ============================================================================

/// Error object carried by a failed response.
///
/// # Format
///
/// ```json
/// { "code": -32000, "message": "Cannot navigate to invalid URL", "data": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Protocol error code.
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Optional extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// RpcResult
// ============================================================================

/// Outcome of one call as reported by the remote end.
///
/// Built by the codec when a response frame is parsed and consumed once by
/// the caller that owns the matching pending call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResult {
    /// The command succeeded with this payload (`null` if absent).
    Success(Value),
    /// The command failed.
    Failure(ErrorObject),
}

impl RpcResult {
    /// Returns `true` if this is a success result.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Splits the result into payload or error object.
    ///
    /// # Errors
    ///
    /// Returns the [`ErrorObject`] of a failed result.
    #[inline]
    pub fn into_payload(self) -> std::result::Result<Value, ErrorObject> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(error) => Err(error),
        }
    }
}

// ============================================================================
// ReturnShape
// ============================================================================

/// What the caller wants back from a successful payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnShape {
    /// Discard the payload.
    Void,
    /// The whole result object.
    #[default]
    Payload,
    /// One named field of the result object.
    Field(&'static str),
}

impl ReturnShape {
    /// Applies the shape to a success payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if a field is requested from a
    /// payload that is not an object or lacks the field.
    pub fn apply(self, method: &str, payload: Value) -> Result<Option<Value>> {
        match self {
            Self::Void => Ok(None),
            Self::Payload => Ok(Some(payload)),
            Self::Field(name) => match payload {
                Value::Object(mut map) => match map.remove(name) {
                    Some(value) => Ok(Some(value)),
                    None => Err(Error::serialization(
                        method,
                        format!("object with field `{name}`"),
                        "object",
                        format!("missing field `{name}`"),
                    )),
                },
                other => Err(Error::serialization(
                    method,
                    format!("object with field `{name}`"),
                    json_shape(&other),
                    "result is not an object",
                )),
            },
        }
    }
}

// ============================================================================
// Payload Decoding
// ============================================================================

/// Decodes a success payload into the requested type.
///
/// # Errors
///
/// Returns [`Error::Serialization`] naming the expected type and the JSON
/// shape actually received.
pub fn decode_payload<T: DeserializeOwned>(method: &str, payload: Value) -> Result<T> {
    let actual = json_shape(&payload);
    serde_json::from_value(payload)
        .map_err(|e| Error::serialization(method, type_name::<T>(), actual, e.to_string()))
}

/// Names the shape of a JSON value for diagnostics.
#[must_use]
pub fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
