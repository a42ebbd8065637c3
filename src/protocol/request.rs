//! Outgoing invocation message.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId};

use super::response::json_shape;

// ============================================================================
// Types
// ============================================================================

/// Ordered parameter mapping sent with an invocation.
pub type Params = Map<String, Value>;

// ============================================================================
// Invocation
// ============================================================================

/// A command invocation from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.command",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    /// Correlation id, unique within the connection.
    pub id: CallId,

    /// Method in `Domain.command` format.
    pub method: String,

    /// Command parameters (always an object on the wire).
    pub params: Params,

    /// Target session to route the command to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Invocation {
    /// Creates an invocation without session routing.
    #[inline]
    #[must_use]
    pub fn new(id: CallId, method: impl Into<String>, params: Params) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Routes the invocation to a target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Serializes the invocation to wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if a parameter value cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Params Conversion
// ============================================================================

/// Converts any serializable value into invocation params.
///
/// `null` (including `()` and `None`) becomes an empty object.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the value does not serialize to a
/// JSON object, and [`Error::Json`] if it cannot be serialized at all.
pub fn to_params<P: Serialize + ?Sized>(params: &P) -> Result<Params> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(Error::invalid_argument(format!(
            "params must serialize to a JSON object, got {}",
            json_shape(&other)
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
