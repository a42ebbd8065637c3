//! Request/response correlation and event dispatch.
//!
//! The [`Dispatcher`] is the single source of truth mapping correlation ids
//! to pending calls and event keys to listeners. Both transports of a
//! connection feed their inbound frames into the same dispatcher.
//!
//! # Frame Routing
//!
//! ```text
//! transport ──► ChannelHandler ──► Dispatcher::on_frame
//!                                    ├─ response, id pending  → resolve PendingCall
//!                                    ├─ response, id unknown  → drop (trace)
//!                                    ├─ event                 → every listener for Domain.event
//!                                    └─ malformed             → drop (warn)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Dispatcher and per-channel frame handler |
//! | `listeners` | Event listener registry |
//! | `pending` | Pending-call table and completion handle |

// ============================================================================
// Submodules
// ============================================================================

/// Dispatcher and per-channel frame handler.
pub mod dispatcher;

/// Event listener registry.
pub mod listeners;

/// Pending-call table.
pub mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{ChannelHandler, Dispatcher};
pub use listeners::Listener;
pub use pending::PendingCall;
