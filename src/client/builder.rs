//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and connecting [`RpcClient`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use devtools_rpc::{RpcClient, TransportBackend};
//!
//! # async fn example() -> devtools_rpc::Result<()> {
//! let client = RpcClient::builder()
//!     .backend(TransportBackend::Tungstenite)
//!     .read_timeout(Duration::from_secs(10))
//!     .discover("http://127.0.0.1:9222")
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::TransportBackend;

use super::core::RpcClient;
use super::discovery;
use super::options::ClientOptions;
use super::routing::RoutingTable;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring an [`RpcClient`].
///
/// Use [`RpcClient::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Browser-level WebSocket URL.
    browser_url: Option<String>,
    /// Page-level WebSocket URL; defaults to the browser URL.
    page_url: Option<String>,
    /// Connection options.
    options: ClientOptions,
    /// Method routing.
    routing: RoutingTable,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the browser-level WebSocket URL.
    #[inline]
    #[must_use]
    pub fn browser_url(mut self, url: impl Into<String>) -> Self {
        self.browser_url = Some(url.into());
        self
    }

    /// Sets the page-level WebSocket URL.
    #[inline]
    #[must_use]
    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    /// Sets the transport backend.
    #[inline]
    #[must_use]
    pub fn backend(mut self, backend: TransportBackend) -> Self {
        self.options.backend = backend;
        self
    }

    /// Sets the per-call read timeout.
    #[inline]
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Sets the maximum inbound message size in bytes.
    #[inline]
    #[must_use]
    pub fn inbound_buffer_size(mut self, bytes: usize) -> Self {
        self.options.inbound_buffer_size = bytes;
        self
    }

    /// Sets the close drain grace period.
    #[inline]
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.options.shutdown_grace = grace;
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the method routing table.
    #[inline]
    #[must_use]
    pub fn routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    /// Connects both channels.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no browser URL is set, a URL is not `ws`/`wss`,
    ///   or the options are invalid
    /// - [`Error::Connection`] if an endpoint is unreachable
    pub async fn connect(self) -> Result<RpcClient> {
        self.options.validate()?;

        let browser_url = self.browser_url.ok_or_else(|| {
            Error::config(
                "Browser WebSocket URL is required. Use .browser_url() or .discover().\n\
                 Example: RpcClient::builder().browser_url(\"ws://127.0.0.1:9222/devtools/browser/<id>\")",
            )
        })?;
        validate_ws_url(&browser_url)?;

        let page_url = match self.page_url {
            Some(url) => {
                validate_ws_url(&url)?;
                url
            }
            None => browser_url.clone(),
        };

        RpcClient::open(&browser_url, &page_url, self.options, self.routing).await
    }

    /// Discovers endpoints over HTTP, then connects.
    ///
    /// Explicitly set URLs are replaced by the discovered ones.
    ///
    /// # Errors
    ///
    /// Discovery errors (see [`discovery::discover`]) and the errors of
    /// [`connect`](Self::connect).
    pub async fn discover(self, http_base: &str) -> Result<RpcClient> {
        let endpoints = discovery::discover(http_base).await?;
        self.browser_url(endpoints.browser)
            .page_url(endpoints.page)
            .connect()
            .await
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_ws_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("invalid WebSocket URL `{raw}`: {e}")))?;

    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(Error::config(format!(
            "WebSocket URL must use ws or wss, got `{other}` in `{raw}`"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
