//! Event notification types.
//!
//! Events are notifications the remote end broadcasts when browser activity
//! occurs. They carry no correlation id and are keyed by `Domain.event`.
//!
//! # Examples of Keys
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `loadEventFired`, `frameNavigated`, `lifecycleEvent` |
//! | `Network` | `requestWillBeSent`, `responseReceived`, `loadingFinished` |
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown` |
//! | `Target` | `attachedToTarget`, `targetDestroyed` |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::SessionId;

use super::response::decode_payload;

// ============================================================================
// Event
// ============================================================================

/// An event notification from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "optional"
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data (`null` if absent).
    pub params: Value,

    /// Session the event originated from, for attached targets.
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Creates an event without session information.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Returns the listener key (`Domain.eventName`).
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.method
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Page.loadEventFired", Value::Null);
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method
            .split_once('.')
            .map_or(self.method.as_str(), |(domain, _)| domain)
    }

    /// Returns the event name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Page.loadEventFired", Value::Null);
    /// assert_eq!(event.event_name(), "loadEventFired");
    /// ```
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method
            .split_once('.')
            .map_or("", |(_, name)| name)
    }

    /// Decodes the params into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the params do not fit `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        decode_payload(&self.method, self.params.clone())
    }
}

/// Builds the listener key for a domain and event name.
#[inline]
#[must_use]
pub fn event_key(domain: &str, event: &str) -> String {
    format!("{domain}.{event}")
}

// ============================================================================
// Tests
// ============================================================================
