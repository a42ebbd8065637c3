//! Transport layer.
//!
//! A transport owns one physical duplex text connection to the remote
//! debugging endpoint. It sends raw frames and hands every inbound frame,
//! unmodified and in arrival order, to a single [`FrameHandler`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  RpcClient       │   browser-level WebSocket    │  Browser        │
//! │   ├ browser ─────┼─────────────────────────────►│  /devtools/     │
//! │   └ page ────────┼─────────────────────────────►│  browser|page   │
//! │  Dispatcher ◄────┼── on_frame (both channels) ──│                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Backends
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | [`TransportBackend::Tungstenite`] | [`AsyncWsTransport`] | tokio task, default |
//! | [`TransportBackend::Blocking`] | [`BlockingWsTransport`] | synchronous socket on an OS thread |
//! | (in-process) | [`MemoryTransport`] | paired with a [`MemoryPeer`] for simulated responders |

// ============================================================================
// Submodules
// ============================================================================

/// Async WebSocket transport on tokio-tungstenite.
pub mod async_ws;

/// Blocking WebSocket transport on a dedicated thread.
pub mod blocking_ws;

/// Backend selection.
pub mod factory;

/// In-process transport for simulated remote ends.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

// ============================================================================
// Re-exports
// ============================================================================

pub use async_ws::AsyncWsTransport;
pub use blocking_ws::BlockingWsTransport;
pub use factory::TransportFactory;
pub use memory::{MemoryPeer, MemoryTransport};

// ============================================================================
// Transport
// ============================================================================

/// One physical duplex text channel.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Endpoint this transport is connected to.
    fn url(&self) -> &str;

    /// Returns `true` until the transport is closed locally or remotely.
    fn is_open(&self) -> bool;

    /// Replaces the inbound frame handler (last registration wins).
    fn set_handler(&self, handler: Arc<dyn FrameHandler>);

    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the transport is closed
    /// - [`Error::WebSocket`] or [`Error::Connection`] if the write fails
    async fn send(&self, frame: String) -> Result<()>;

    /// Closes the transport. Safe to call any number of times.
    async fn close(&self);
}

// ============================================================================
// FrameHandler
// ============================================================================

/// Receiver of inbound frames.
///
/// Called on the transport's reader task or thread. Implementations must
/// not block for long: later frames wait until `on_frame` returns.
pub trait FrameHandler: Send + Sync {
    /// Called once per inbound text frame, in arrival order.
    fn on_frame(&self, frame: &str);

    /// Called once when the transport stops reading.
    fn on_close(&self, reason: &str) {
        let _ = reason;
    }
}

/// Shared slot holding the current frame handler.
#[derive(Default)]
pub(crate) struct HandlerSlot {
    handler: RwLock<Option<Arc<dyn FrameHandler>>>,
}

impl HandlerSlot {
    pub(crate) fn new(handler: Option<Arc<dyn FrameHandler>>) -> Self {
        Self {
            handler: RwLock::new(handler),
        }
    }

    pub(crate) fn set(&self, handler: Arc<dyn FrameHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn FrameHandler>> {
        self.handler.read().clone()
    }

    pub(crate) fn deliver(&self, frame: &str) {
        if let Some(handler) = self.get() {
            handler.on_frame(frame);
        }
    }

    pub(crate) fn closed(&self, reason: &str) {
        if let Some(handler) = self.get() {
            handler.on_close(reason);
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Which of a connection's two transports a call travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Browser-level channel (target and session lifecycle).
    Browser,
    /// Page/target-level channel (everything else).
    Page,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browser => f.write_str("browser"),
            Self::Page => f.write_str("page"),
        }
    }
}

// ============================================================================
// TransportBackend
// ============================================================================

/// WebSocket client implementation selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportBackend {
    /// Async tokio-tungstenite client.
    #[default]
    Tungstenite,
    /// Synchronous tungstenite client on a dedicated thread.
    Blocking,
}

impl TransportBackend {
    /// Configuration name of the backend.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tungstenite => "tungstenite",
            Self::Blocking => "blocking",
        }
    }
}

impl fmt::Display for TransportBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportBackend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tungstenite" | "async" | "tokio" => Ok(Self::Tungstenite),
            "blocking" | "sync" => Ok(Self::Blocking),
            other => Err(Error::config(format!(
                "unknown websocket backend `{other}` (expected `tungstenite` or `blocking`)"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!(
            "tungstenite".parse::<TransportBackend>().expect("parse"),
            TransportBackend::Tungstenite
        );
        assert_eq!(
            " Blocking ".parse::<TransportBackend>().expect("parse"),
            TransportBackend::Blocking
        );
        assert!("ktor".parse::<TransportBackend>().is_err());
        assert_eq!(TransportBackend::default(), TransportBackend::Tungstenite);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel::Browser.to_string(), "browser");
        assert_eq!(Channel::Page.to_string(), "page");
    }
}
