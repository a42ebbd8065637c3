//! In-process transport.
//!
//! [`MemoryTransport`] is the local end; [`MemoryPeer`] plays the remote
//! debugging endpoint. Frames sent by the local end queue up on the peer,
//! and frames the peer delivers reach the handler synchronously, in call
//! order. Useful for tests and for simulated responders.
//!
//! # Example
//!
//! ```ignore
//! let (browser, _browser_peer) = memory::pair("memory://browser");
//! let (page, mut page_peer) = memory::pair("memory://page");
//! let client = RpcClient::with_transports(Arc::new(browser), Arc::new(page), options);
//!
//! let call = tokio::spawn({ let c = client.clone(); async move { c.invoke("Page.enable", ()).await } });
//! let sent = page_peer.recv_json().await.unwrap();
//! page_peer.respond(sent["id"].as_u64().unwrap(), json!({}));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{FrameHandler, HandlerSlot, Transport};

// ============================================================================
// Shared State
// ============================================================================

struct MemoryShared {
    url: String,
    open: AtomicBool,
    handler: HandlerSlot,
}

impl MemoryShared {
    fn shut(&self, reason: &str) -> bool {
        if self.open.swap(false, Ordering::SeqCst) {
            self.handler.closed(reason);
            true
        } else {
            false
        }
    }
}

/// Creates a connected transport/peer pair.
#[must_use]
pub fn pair(url: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
    let shared = Arc::new(MemoryShared {
        url: url.into(),
        open: AtomicBool::new(true),
        handler: HandlerSlot::default(),
    });
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            shared: Arc::clone(&shared),
            sent_tx,
        },
        MemoryPeer { shared, sent_rx },
    )
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Local end of an in-process connection.
pub struct MemoryTransport {
    shared: Arc<MemoryShared>,
    sent_tx: mpsc::UnboundedSender<String>,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("url", &self.shared.url)
            .field("open", &self.is_open())
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn url(&self) -> &str {
        &self.shared.url
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn set_handler(&self, handler: Arc<dyn FrameHandler>) {
        self.shared.handler.set(handler);
    }

    async fn send(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        trace!(url = %self.shared.url, "Frame sent");
        self.sent_tx
            .send(frame)
            .map_err(|_| Error::connection("memory peer dropped"))
    }

    async fn close(&self) {
        if self.shared.shut("closed locally") {
            debug!(url = %self.shared.url, "Transport closed");
        }
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Remote end of an in-process connection.
pub struct MemoryPeer {
    shared: Arc<MemoryShared>,
    sent_rx: mpsc::UnboundedReceiver<String>,
}

impl fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPeer")
            .field("url", &self.shared.url)
            .finish_non_exhaustive()
    }
}

impl MemoryPeer {
    /// Waits for the next frame sent by the local end.
    pub async fn recv(&mut self) -> Option<String> {
        self.sent_rx.recv().await
    }

    /// Returns the next sent frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<String> {
        self.sent_rx.try_recv().ok()
    }

    /// Waits for the next sent frame and parses it as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let frame = self.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Delivers a raw frame to the local handler.
    ///
    /// Frames delivered after the transport closed are discarded.
    pub fn deliver(&self, frame: impl AsRef<str>) {
        if self.shared.open.load(Ordering::SeqCst) {
            self.shared.handler.deliver(frame.as_ref());
        }
    }

    /// Delivers a success response for `id`.
    pub fn respond(&self, id: u64, result: Value) {
        self.deliver(json!({ "id": id, "result": result }).to_string());
    }

    /// Delivers an error response for `id`.
    pub fn respond_error(&self, id: u64, code: i64, message: &str) {
        let error = json!({ "code": code, "message": message });
        self.deliver(json!({ "id": id, "error": error }).to_string());
    }

    /// Delivers an event notification.
    pub fn emit(&self, method: &str, params: Value) {
        self.deliver(json!({ "method": method, "params": params }).to_string());
    }

    /// Simulates the remote end dropping the connection.
    pub fn disconnect(&self) {
        self.shared.shut("closed by remote");
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Installs a test-writer subscriber filtered by `RUST_LOG`.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Frame handler that records everything it receives.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingHandler {
    frames: parking_lot::Mutex<Vec<String>>,
    close_reason: parking_lot::Mutex<Option<String>>,
    changed: tokio::sync::Notify,
}

#[cfg(test)]
impl RecordingHandler {
    /// Waits until at least `count` frames arrived and returns them.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<String> {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                {
                    let frames = self.frames.lock();
                    if frames.len() >= count {
                        return frames.clone();
                    }
                }
                notified.await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("frames did not arrive in time")
    }

    /// Waits until the transport reported closure.
    pub(crate) async fn wait_closed(&self) -> String {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(reason) = self.close_reason() {
                    return reason;
                }
                notified.await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("transport did not close in time")
    }

    pub(crate) fn close_reason(&self) -> Option<String> {
        self.close_reason.lock().clone()
    }
}

#[cfg(test)]
impl FrameHandler for RecordingHandler {
    fn on_frame(&self, frame: &str) {
        self.frames.lock().push(frame.to_owned());
        self.changed.notify_waiters();
    }

    fn on_close(&self, reason: &str) {
        *self.close_reason.lock() = Some(reason.to_owned());
        self.changed.notify_waiters();
    }
}

// ============================================================================
// Tests
// ============================================================================
