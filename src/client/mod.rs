//! RPC client and connection setup.
//!
//! # Connecting
//!
//! ```no_run
//! use devtools_rpc::RpcClient;
//!
//! # async fn example() -> devtools_rpc::Result<()> {
//! // Explicit endpoint (both channels share the browser URL)
//! let client = RpcClient::connect("ws://127.0.0.1:9222/devtools/browser/abc").await?;
//!
//! // Or discover both endpoints over HTTP
//! let client = RpcClient::builder().discover("http://127.0.0.1:9222").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent connection builder |
//! | `core` | [`RpcClient`] and [`Call`] |
//! | `discovery` | `/json/version` and `/json/list` lookup |
//! | `options` | [`ClientOptions`] and environment loading |
//! | `routing` | Method → channel routing table |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent connection builder.
pub mod builder;

/// RPC client implementation.
pub mod core;

/// DevTools HTTP endpoint discovery.
pub mod discovery;

/// Client configuration.
pub mod options;

/// Method routing.
pub mod routing;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use self::core::{Call, RpcClient};
pub use discovery::{BrowserVersion, Endpoints, TargetInfo, discover};
pub use options::ClientOptions;
pub use routing::RoutingTable;
