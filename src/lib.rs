//! DevTools RPC - Async client for the browser remote debugging protocol.
//!
//! This library turns a WebSocket connection to a debuggable browser into a
//! typed, concurrent request/response and event-notification API.
//!
//! # Architecture
//!
//! Each connection multiplexes concurrent calls over two transports:
//!
//! - **Browser channel**: target and session lifecycle (`Target.*`)
//! - **Page channel**: everything else (`Page.*`, `Runtime.*`, ...)
//!
//! Key design principles:
//!
//! - Every call gets a unique correlation id and resolves exactly once:
//!   by response, by timeout, or by cancellation when the connection closes
//! - Protocol uses `Domain.command` / `Domain.event` names
//! - Inbound frames are dispatched in arrival order; malformed frames are
//!   dropped, never fatal
//! - Event-driven architecture (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_rpc::{RpcClient, Result};
//! use devtools_rpc::domains::Page;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Discover endpoints from a browser started with --remote-debugging-port
//!     let client = RpcClient::builder()
//!         .discover("http://127.0.0.1:9222")
//!         .await?;
//!
//!     client.add_event_listener("Page", "loadEventFired", |event| {
//!         println!("loaded at {}", event.params["timestamp"]);
//!     });
//!
//!     let page = client.domain::<Page>();
//!     page.enable().await?;
//!     let frame_id = page.navigate("https://example.com".into()).await?;
//!     println!("Navigated frame: {}", frame_id);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`RpcClient`], [`ClientBuilder`], [`ClientOptions`] |
//! | [`dispatch`] | Response correlation and event dispatch |
//! | [`domains`] | Ready-made `Page`, `Runtime`, `Target`, `Network` interfaces |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`metrics`] | Per-connection counters |
//! | [`protocol`] | Wire message types |
//! | [`proxy`] | Typed domain interfaces and the [`domain!`] macro |
//! | [`transport`] | WebSocket and in-memory transports |
//!
//! # Configuration
//!
//! [`ClientOptions::from_env`] reads `DEVTOOLS_WS_BACKEND`,
//! `DEVTOOLS_READ_TIMEOUT_MS`, `DEVTOOLS_INBOUND_BUFFER_SIZE` and
//! `DEVTOOLS_SHUTDOWN_GRACE_MS`.

// ============================================================================
// Modules
// ============================================================================

/// RPC client and connection setup.
///
/// Use [`RpcClient::builder()`] to configure and connect a client.
pub mod client;

/// Response correlation and event dispatch.
pub mod dispatch;

/// Ready-made domain interfaces.
pub mod domains;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Per-connection counters mirrored to the `metrics` facade.
pub mod metrics;

/// Wire message types.
///
/// Invocations, inbound frames, results and events.
pub mod protocol;

/// Typed domain interfaces.
pub mod proxy;

/// Transport layer.
///
/// Async and blocking WebSocket backends plus an in-memory pair for tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Call, ClientBuilder, ClientOptions, RoutingTable, RpcClient};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, ListenerId, SessionId};

// Metrics
pub use metrics::MetricsSnapshot;

// Protocol types
pub use protocol::{ErrorObject, Event, ReturnShape, RpcResult};

// Proxy types
pub use proxy::{Domain, DomainProxy};

// Transport types
pub use transport::{Channel, Transport, TransportBackend};

#[doc(hidden)]
pub use serde_json;
