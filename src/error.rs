//! Error types for the DevTools RPC client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use devtools_rpc::{Error, Result, RpcClient};
//!
//! async fn example(client: &RpcClient) -> Result<()> {
//!     match client.invoke("Page.navigate", json!({ "url": "https://example.com" })).await {
//!         Err(Error::Timeout { method, .. }) => tracing::warn!(%method, "slow page"),
//!         other => { other?; }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::WebSocket`], [`Error::Io`], [`Error::Http`] |
//! | Timeout | [`Error::Timeout`] |
//! | Remote | [`Error::Rpc`] |
//! | Serialization | [`Error::Serialization`], [`Error::Json`] |
//! | Protocol | [`Error::Protocol`] |
//! | Cancellation | [`Error::Cancelled`] |
//! | Usage | [`Error::Config`], [`Error::InvalidArgument`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CallId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant carries enough context (method, params, call id) to
/// diagnose a failure without re-running it.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client options or environment settings are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a call.
    ///
    /// Returned when params do not form a JSON object or a domain method
    /// receives the wrong number of arguments.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when a transport cannot be established or a write fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport or client is closed.
    ///
    /// Returned by `send` on a closed transport and by calls issued after
    /// the client started shutting down.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// The response did not arrive within the read timeout.
    #[error("Call {call_id} ({method}) timed out after {elapsed_ms}ms")]
    Timeout {
        /// Method that was invoked.
        method: String,
        /// Correlation id of the abandoned call.
        call_id: CallId,
        /// Milliseconds waited before giving up.
        elapsed_ms: u64,
    },

    /// The remote end reported that the command failed.
    #[error("RPC error {code} in {method}: {message}")]
    Rpc {
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
        /// Optional extra detail supplied by the remote end.
        data: Option<Value>,
        /// Method that was invoked.
        method: String,
        /// Params that were sent.
        params: Value,
        /// Correlation id of the failed call.
        call_id: CallId,
    },

    /// A payload could not be decoded into the requested shape.
    #[error("Cannot decode {method} result: expected {expected}, got {actual}: {message}")]
    Serialization {
        /// Method whose result was being decoded.
        method: String,
        /// Name of the requested target type.
        expected: String,
        /// Shape of the JSON value actually received.
        actual: String,
        /// Underlying decoder message.
        message: String,
    },

    /// The call was force-failed before a response arrived.
    ///
    /// Returned to every pending caller when the connection closes.
    #[error("Call to {method} cancelled: {reason}")]
    Cancelled {
        /// Method that was invoked.
        method: String,
        /// Why the call was cancelled.
        reason: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation.
    ///
    /// Raised for unparseable or ambiguous inbound frames and duplicate
    /// call ids. Inbound violations are logged and dropped by the
    /// dispatcher, never handed to a caller.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error while querying DevTools discovery endpoints.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a call timeout error.
    #[inline]
    pub fn timeout(method: impl Into<String>, call_id: CallId, elapsed_ms: u64) -> Self {
        Self::Timeout {
            method: method.into(),
            call_id,
            elapsed_ms,
        }
    }

    /// Creates a cancellation error.
    #[inline]
    pub fn cancelled(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Creates a serialization error for a result that did not fit.
    #[inline]
    pub fn serialization(
        method: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Serialization {
            method: method.into(),
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a call timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the remote end rejected the command.
    #[inline]
    #[must_use]
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    /// Returns the protocol error code for [`Error::Rpc`].
    #[inline]
    #[must_use]
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::Cancelled { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry over the same connection.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Rpc { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
