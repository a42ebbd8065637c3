//! A small set of ready-made domain interfaces.
//!
//! Only the commands most automation code needs; declare further domains
//! with [`domain!`](crate::domain).
//!
//! ```ignore
//! use devtools_rpc::domains::{Page, Runtime};
//!
//! let page = client.domain::<Page>();
//! page.enable().await?;
//! let frame_id = page.navigate("https://example.com".into()).await?;
//!
//! let result = client.domain::<Runtime>().evaluate("document.title".into(), Some(true)).await?;
//! ```

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Result Types
// ============================================================================

/// `Target.getTargets` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target id.
    pub target_id: String,
    /// Target type, e.g. `page`.
    #[serde(rename = "type")]
    pub target_type: String,
    /// Document title.
    #[serde(default)]
    pub title: String,
    /// Document URL.
    #[serde(default)]
    pub url: String,
    /// Whether a client is attached.
    #[serde(default)]
    pub attached: bool,
}

/// `Target.getTargets` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetList {
    /// Known targets.
    pub target_infos: Vec<TargetInfo>,
}

/// `Runtime.evaluate` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Remote object describing the value.
    pub result: Value,
    /// Present when the script threw.
    #[serde(default)]
    pub exception_details: Option<Value>,
}

// ============================================================================
// Domains
// ============================================================================

crate::domain! {
    /// Page domain: navigation and lifecycle.
    pub struct Page = "Page" {
        fn enable = "enable" ();
        fn disable = "disable" ();
        /// Navigates the page; returns the frame id.
        fn navigate = "navigate" (url: String => "url") -> String, returns "frameId";
        fn reload = "reload" (ignore_cache: Option<bool> => "ignoreCache");
        /// Captures a screenshot; returns base64 image data.
        fn capture_screenshot = "captureScreenshot" (
            format: Option<String> => "format",
        ) -> String, returns "data";
    }
}

crate::domain! {
    /// Runtime domain: script evaluation.
    pub struct Runtime = "Runtime" {
        fn enable = "enable" ();
        fn evaluate = "evaluate" (
            expression: String => "expression",
            return_by_value: Option<bool> => "returnByValue",
        ) -> Evaluation;
        fn release_object = "releaseObject" (object_id: String => "objectId");
    }
}

crate::domain! {
    /// Target domain: target discovery and session attachment.
    ///
    /// Routed to the browser-level channel.
    pub struct Target = "Target" {
        fn get_targets = "getTargets" () -> TargetList;
        fn create_target = "createTarget" (url: String => "url") -> String, returns "targetId";
        fn attach_to_target = "attachToTarget" (
            target_id: String => "targetId",
            flatten: Option<bool> => "flatten",
        ) -> String, returns "sessionId";
        fn close_target = "closeTarget" (target_id: String => "targetId");
        fn set_discover_targets = "setDiscoverTargets" (discover: bool => "discover");
    }
}

crate::domain! {
    /// Network domain.
    pub struct Network = "Network" {
        fn enable = "enable" ();
        fn disable = "disable" ();
        fn set_extra_http_headers = "setExtraHTTPHeaders" (headers: Value => "headers");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    use crate::client::{ClientOptions, RpcClient};
    use crate::transport::memory;

    #[tokio::test]
    async fn test_target_goes_to_browser_and_page_to_page() {
        let (browser, mut browser_peer) = memory::pair("memory://browser");
        let (page, mut page_peer) = memory::pair("memory://page");
        let client =
            RpcClient::with_transports(Arc::new(browser), Arc::new(page), ClientOptions::new());

        let attach = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .domain::<Target>()
                    .attach_to_target("T1".into(), Some(true))
                    .await
            }
        });
        let sent = browser_peer.recv_json().await.expect("browser frame");
        assert_eq!(sent["method"], "Target.attachToTarget");
        assert_eq!(sent["params"], json!({ "targetId": "T1", "flatten": true }));
        let id = sent["id"].as_u64().expect("id");
        browser_peer.respond(id, json!({ "sessionId": "S1" }));
        assert_eq!(attach.await.expect("join").expect("attach"), "S1");

        let navigate = tokio::spawn({
            let client = client.clone();
            async move {
                let page = client.domain::<Page>();
                page.navigate("https://example.com".into()).await
            }
        });
        let sent = page_peer.recv_json().await.expect("page frame");
        assert_eq!(sent["method"], "Page.navigate");
        let id = sent["id"].as_u64().expect("id");
        page_peer.respond(id, json!({ "frameId": "F1" }));
        assert_eq!(navigate.await.expect("join").expect("navigate"), "F1");
    }

    #[tokio::test]
    async fn test_evaluate_decodes_result() {
        let (browser, _browser_peer) = memory::pair("memory://browser");
        let (page, mut page_peer) = memory::pair("memory://page");
        let client =
            RpcClient::with_transports(Arc::new(browser), Arc::new(page), ClientOptions::new());

        let evaluate = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .domain::<Runtime>()
                    .evaluate("1 + 1".into(), Some(true))
                    .await
            }
        });
        let sent = page_peer.recv_json().await.expect("frame");
        assert_eq!(sent["params"]["returnByValue"], true);
        page_peer.respond(
            sent["id"].as_u64().expect("id"),
            json!({ "result": { "type": "number", "value": 2 } }),
        );

        let evaluation = evaluate.await.expect("join").expect("evaluate");
        assert_eq!(evaluation.result["value"], 2);
        assert!(evaluation.exception_details.is_none());
    }
}
