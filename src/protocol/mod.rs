//! Wire message types and codec.
//!
//! This module defines the JSON message format exchanged with the remote
//! debugging endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Keyed by |
//! |--------------|-----------|----------|
//! | [`Invocation`] | Local → Remote | `id` |
//! | Response ([`InboundFrame::Response`]) | Remote → Local | `id` |
//! | [`Event`] ([`InboundFrame::Event`]) | Remote → Local | `method` (`Domain.event`) |
//!
//! A frame carrying an `id` is a response; a frame without one but with a
//! `method` is an event. Anything else is a protocol violation.
//!
//! # Method Naming
//!
//! Commands and events follow `Domain.name` format:
//!
//! - `Page.navigate`
//! - `Target.attachToTarget`
//! - `Network.requestWillBeSent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Outgoing invocation |
//! | `response` | RPC result, error object, return shapes |
//! | `event` | Event notifications |
//! | `frame` | Inbound frame decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Event notification types.
pub mod event;

/// Inbound frame decoding.
pub mod frame;

/// Outgoing invocation type.
pub mod request;

/// RPC results, error objects and payload decoding.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Event, event_key};
pub use frame::InboundFrame;
pub use request::{Invocation, Params, to_params};
pub use response::{ErrorObject, ReturnShape, RpcResult, decode_payload, json_shape};
