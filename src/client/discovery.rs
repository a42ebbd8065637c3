//! DevTools HTTP endpoint discovery.
//!
//! A debuggable browser serves its WebSocket endpoints over plain HTTP:
//!
//! | Endpoint | Yields |
//! |----------|--------|
//! | `GET /json/version` | browser-level `webSocketDebuggerUrl` |
//! | `GET /json/list` | targets; the first `page` target's `webSocketDebuggerUrl` |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for each discovery request.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Response of `GET /json/version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowserVersion {
    /// Browser product and version, e.g. `HeadlessChrome/120.0`.
    #[serde(rename = "Browser", default)]
    pub browser: String,

    /// Protocol version, e.g. `1.3`.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,

    /// Browser-level WebSocket endpoint.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// One entry of `GET /json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target id.
    pub id: String,

    /// Target type (`page`, `iframe`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,

    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Document URL.
    #[serde(default)]
    pub url: String,

    /// Target-level WebSocket endpoint; absent while another client is attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// The two WebSocket endpoints a client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Browser-level channel.
    pub browser: String,
    /// Page-level channel.
    pub page: String,
}

// ============================================================================
// Discovery
// ============================================================================

/// Discovers the browser and first page endpoints behind `http_base`.
///
/// # Errors
///
/// - [`Error::Config`] if `http_base` is not an http(s) URL
/// - [`Error::Http`] if a request fails
/// - [`Error::Connection`] if no page target exposes an endpoint
pub async fn discover(http_base: &str) -> Result<Endpoints> {
    let base = parse_base(http_base)?;
    let http = reqwest::Client::builder()
        .timeout(DISCOVERY_TIMEOUT)
        .build()?;

    let version = fetch_version(&http, &base).await?;
    let targets = list_targets(&http, &base).await?;

    let page = targets
        .into_iter()
        .find(|target| target.target_type == "page" && target.web_socket_debugger_url.is_some())
        .and_then(|target| target.web_socket_debugger_url)
        .ok_or_else(|| Error::connection(format!("no page target available at {base}")))?;

    debug!(
        browser = %version.browser,
        protocol = %version.protocol_version,
        page = %page,
        "Endpoints discovered"
    );

    Ok(Endpoints {
        browser: version.web_socket_debugger_url,
        page,
    })
}

/// Fetches `GET /json/version`.
///
/// # Errors
///
/// Returns [`Error::Http`] on request, status or decoding failure.
pub async fn fetch_version(http: &reqwest::Client, base: &Url) -> Result<BrowserVersion> {
    let url = endpoint(base, "json/version")?;
    let version = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<BrowserVersion>()
        .await?;
    Ok(version)
}

/// Fetches `GET /json/list`.
///
/// # Errors
///
/// Returns [`Error::Http`] on request, status or decoding failure.
pub async fn list_targets(http: &reqwest::Client, base: &Url) -> Result<Vec<TargetInfo>> {
    let url = endpoint(base, "json/list")?;
    let targets = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<TargetInfo>>()
        .await?;
    Ok(targets)
}

fn parse_base(http_base: &str) -> Result<Url> {
    let base = Url::parse(http_base)
        .map_err(|e| Error::config(format!("invalid discovery URL `{http_base}`: {e}")))?;

    match base.scheme() {
        "http" | "https" => Ok(base),
        other => Err(Error::config(format!(
            "discovery URL must be http or https, got `{other}`"
        ))),
    }
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::config(format!("cannot build {path} URL from {base}: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
