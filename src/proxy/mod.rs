//! Typed domain interfaces over the RPC client.
//!
//! A domain interface is declared once with [`domain!`](crate::domain) and
//! obtained from a client with [`RpcClient::domain`](crate::RpcClient::domain).
//! Each generated method carries a static [`MethodSignature`]; the first
//! call per signature builds an [`InvocationStrategy`], which the client's
//! [`ProxyCache`] then reuses.
//!
//! ```text
//! page.navigate(url) ──► MethodSignature { "Page", "navigate", ["url"], Field("frameId") }
//!                      ──► ProxyCache ──► InvocationStrategy ──► Call ──► RpcClient::execute
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `domain` | [`Domain`] trait and [`DomainProxy`] |
//! | `macros` | The `domain!` macro |
//! | `strategy` | Signatures, strategies and the cache |

// ============================================================================
// Submodules
// ============================================================================

/// Domain trait and proxy.
pub mod domain;

/// Interface declaration macro.
mod macros;

/// Signatures, strategies and the cache.
pub mod strategy;

// ============================================================================
// Re-exports
// ============================================================================

pub use domain::{Domain, DomainProxy};
pub use strategy::{InvocationStrategy, MethodSignature, ProxyCache, to_argument};

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::{Value, json};

    use crate::client::{ClientOptions, RpcClient};
    use crate::error::Error;
    use crate::transport::memory::{self, MemoryPeer};

    crate::domain! {
        /// Test domain.
        pub struct Demo = "Demo" {
            /// No params, no result.
            fn ping = "ping" ();
            fn echo = "echo" (text: String => "text", count: Option<u32> => "count") -> Value;
            fn open = "open" (url: String => "url") -> String, returns "frameId";
            fn layout = "getLayout" () -> Layout;
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Layout {
        content_width: u32,
        content_height: u32,
    }

    fn client() -> (RpcClient, MemoryPeer) {
        let (browser, _browser_peer) = memory::pair("memory://browser");
        let (page, page_peer) = memory::pair("memory://page");
        let client =
            RpcClient::with_transports(Arc::new(browser), Arc::new(page), ClientOptions::new());
        (client, page_peer)
    }

    /// Answers each sent frame with the next result and returns the sent frames.
    fn respond_with(
        mut peer: MemoryPeer,
        results: Vec<Value>,
    ) -> tokio::task::JoinHandle<Vec<Value>> {
        tokio::spawn(async move {
            let mut sent = Vec::new();
            for result in results {
                let frame = peer.recv_json().await.expect("frame");
                let id = frame["id"].as_u64().expect("id");
                sent.push(frame);
                if let Some(error) = result.get("__error") {
                    peer.respond_error(id, error.as_i64().unwrap_or(-1), "failed");
                } else {
                    peer.respond(id, result);
                }
            }
            sent
        })
    }

    #[tokio::test]
    async fn test_generated_methods_round_trip() {
        let (client, peer) = client();
        let responder = respond_with(
            peer,
            vec![
                json!({}),
                json!({ "echoed": "hi" }),
                json!({ "frameId": "F1", "loaderId": "L1" }),
                json!({ "contentWidth": 800, "contentHeight": 600 }),
            ],
        );

        let demo = client.domain::<Demo>();
        demo.ping().await.expect("ping");
        assert_eq!(
            demo.echo("hi".into(), None).await.expect("echo"),
            json!({ "echoed": "hi" })
        );
        assert_eq!(demo.open("https://example.com".into()).await.expect("open"), "F1");
        assert_eq!(
            demo.layout().await.expect("layout"),
            Layout {
                content_width: 800,
                content_height: 600
            }
        );

        let sent = responder.await.expect("responder");
        assert_eq!(sent[0]["method"], "Demo.ping");
        assert_eq!(sent[0]["params"], json!({}));
        assert_eq!(sent[1]["method"], "Demo.echo");
        assert_eq!(sent[1]["params"], json!({ "text": "hi" }));
        assert_eq!(sent[2]["method"], "Demo.open");
        assert_eq!(sent[2]["params"], json!({ "url": "https://example.com" }));
        assert_eq!(sent[3]["method"], "Demo.getLayout");
    }

    #[tokio::test]
    async fn test_strategies_are_cached_per_signature() {
        let (client, peer) = client();
        let responder = respond_with(peer, vec![json!({}), json!({}), json!({})]);

        let demo = client.domain::<Demo>();
        demo.ping().await.expect("ping");
        demo.ping().await.expect("ping");
        client
            .domain::<Demo>()
            .echo("x".into(), Some(2))
            .await
            .expect("echo");

        let sent = responder.await.expect("responder");
        assert_eq!(sent[2]["params"], json!({ "text": "x", "count": 2 }));
        assert_eq!(client.proxy_cache().len(), 2);
    }

    #[tokio::test]
    async fn test_rpc_errors_propagate_unchanged() {
        let (client, peer) = client();
        let responder = respond_with(peer, vec![json!({ "__error": -32000 })]);

        let err = client.domain::<Demo>().ping().await.unwrap_err();
        assert_eq!(err.rpc_code(), Some(-32000));
        assert!(matches!(err, Error::Rpc { ref method, .. } if method == "Demo.ping"));
        responder.await.expect("responder");
    }

    #[tokio::test]
    async fn test_result_shape_mismatch_names_both_shapes() {
        let (client, peer) = client();
        let responder = respond_with(
            peer,
            vec![json!({ "contentWidth": "wide" }), json!({ "frameId": 7 })],
        );

        let demo = client.domain::<Demo>();
        match demo.layout().await.unwrap_err() {
            Error::Serialization {
                method, expected, ..
            } => {
                assert_eq!(method, "Demo.getLayout");
                assert!(expected.ends_with("Layout"));
            }
            other => panic!("expected serialization error, got {other:?}"),
        }

        match demo.open("u".into()).await.unwrap_err() {
            Error::Serialization { actual, .. } => assert_eq!(actual, "number"),
            other => panic!("expected serialization error, got {other:?}"),
        }
        responder.await.expect("responder");
    }
}
