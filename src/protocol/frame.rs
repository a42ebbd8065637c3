//! Inbound frame decoding.
//!
//! Every text frame from the remote end is either a response (has `id`) or
//! an event (no `id`, has `method`).

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId};

use super::event::Event;
use super::response::{ErrorObject, RpcResult, json_shape};

// ============================================================================
// RawFrame
// ============================================================================

/// Union of every field an inbound frame may carry.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<CallId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<SessionId>,
}

// ============================================================================
// InboundFrame
// ============================================================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Response to an earlier invocation.
    Response {
        /// Correlation id of the invocation.
        id: CallId,
        /// Outcome reported by the remote end.
        result: RpcResult,
        /// Session the response came from, if any.
        session_id: Option<SessionId>,
    },
    /// Event notification.
    Event(Event),
    /// Response whose `id` is readable but whose body is not.
    Unreadable {
        /// Correlation id of the invocation.
        id: CallId,
        /// Why the body was rejected.
        reason: String,
    },
}

impl InboundFrame {
    /// Decodes wire text into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is not a JSON object, carries
    /// neither `id` nor `method`, or names an event without a domain. A
    /// malformed body with a numeric `id` decodes as
    /// [`InboundFrame::Unreadable`] so the call can be failed.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("unparseable frame: {e}")))?;

        if !value.is_object() {
            return Err(Error::protocol(format!(
                "frame must be a JSON object, got {}",
                json_shape(&value)
            )));
        }

        let id = value.get("id").and_then(Value::as_u64).map(CallId::new);
        let raw = match RawFrame::deserialize(value) {
            Ok(raw) => raw,
            Err(e) => {
                return match id {
                    Some(id) => Ok(Self::Unreadable {
                        id,
                        reason: format!("malformed response: {e}"),
                    }),
                    None => Err(Error::protocol(format!("malformed frame: {e}"))),
                };
            }
        };

        if let Some(id) = raw.id {
            let result = match raw.error {
                Some(error) => RpcResult::Failure(error),
                None => RpcResult::Success(raw.result.unwrap_or(Value::Null)),
            };
            return Ok(Self::Response {
                id,
                result,
                session_id: raw.session_id,
            });
        }

        let Some(method) = raw.method else {
            return Err(Error::protocol("frame carries neither id nor method"));
        };

        match method.split_once('.') {
            Some((domain, name)) if !domain.is_empty() && !name.is_empty() => {}
            _ => {
                return Err(Error::protocol(format!(
                    "event method `{method}` is not in Domain.event form"
                )));
            }
        }

        Ok(Self::Event(Event {
            method,
            params: raw.params.unwrap_or(Value::Null),
            session_id: raw.session_id,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_decode_success_response() {
        let frame = InboundFrame::decode(r#"{"id":4,"result":{"frameId":"F"}}"#).expect("decode");
        assert_eq!(
            frame,
            InboundFrame::Response {
                id: CallId::new(4),
                result: RpcResult::Success(json!({ "frameId": "F" })),
                session_id: None,
            }
        );
    }

    #[test]
    fn test_decode_response_without_result_is_null_success() {
        let frame = InboundFrame::decode(r#"{"id":5}"#).expect("decode");
        assert!(matches!(
            frame,
            InboundFrame::Response { result: RpcResult::Success(Value::Null), .. }
        ));
    }

    #[test]
    fn test_decode_error_response() {
        let frame = InboundFrame::decode(
            r#"{"id":6,"error":{"code":-32000,"message":"No target","data":"x"},"sessionId":"S"}"#,
        )
        .expect("decode");

        let InboundFrame::Response {
            id,
            result: RpcResult::Failure(error),
            session_id,
        } = frame
        else {
            panic!("expected failure response");
        };
        assert_eq!(id, CallId::new(6));
        assert_eq!(error.code, -32000);
        assert_eq!(error.data, Some(json!("x")));
        assert_eq!(session_id, Some(SessionId::from("S")));
    }

    #[test]
    fn test_decode_event() {
        let frame = InboundFrame::decode(
            r#"{"method":"Page.frameNavigated","params":{"frame":{"id":"F"}},"sessionId":"S"}"#,
        )
        .expect("decode");

        let InboundFrame::Event(event) = frame else {
            panic!("expected event");
        };
        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "frameNavigated");
        assert_eq!(event.session_id, Some(SessionId::from("S")));
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        for text in [
            "not json",
            "[1,2,3]",
            "{}",
            r#"{"params":{}}"#,
            r#"{"method":"noDomain"}"#,
            r#"{"id":"seven","result":{}}"#,
            r#"{"id":"seven","error":{"message":"missing code"}}"#,
        ] {
            let err = InboundFrame::decode(text).unwrap_err();
            assert!(matches!(err, Error::Protocol { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn test_decode_keeps_id_of_unreadable_response() {
        let frame = InboundFrame::decode(r#"{"id":1,"error":{"message":"missing code"}}"#)
            .expect("decode");

        let InboundFrame::Unreadable { id, reason } = frame else {
            panic!("expected unreadable response");
        };
        assert_eq!(id, CallId::new(1));
        assert!(reason.contains("code"), "{reason}");
    }
}
