//! Async WebSocket transport and event loop.
//!
//! # Event Loop
//!
//! The transport spawns a tokio task that owns the socket and handles:
//!
//! - Incoming text frames (handed to the [`FrameHandler`])
//! - Outgoing frames queued by [`Transport::send`]
//! - Shutdown requests
//!
//! Binary, ping and pong frames are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

use super::{FrameHandler, HandlerSlot, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for the event loop to finish after a close request.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Internal commands for the event loop.
enum TransportCommand {
    /// Write a frame and report the outcome.
    Send {
        frame: String,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Close the socket and stop the loop.
    Shutdown,
}

// ============================================================================
// AsyncWsTransport
// ============================================================================

/// WebSocket transport driven by a tokio task.
///
/// # Thread Safety
///
/// `AsyncWsTransport` is `Send + Sync`; `send` may be called from any task.
pub struct AsyncWsTransport {
    /// Endpoint URL.
    url: String,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    /// Inbound frame handler (shared with event loop).
    handler: Arc<HandlerSlot>,
    /// Cleared by the event loop when it stops.
    open: Arc<AtomicBool>,
    /// Set by the first `close` call.
    closing: AtomicBool,
    /// Event loop task, taken by `close`.
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for AsyncWsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWsTransport")
            .field("url", &self.url)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl AsyncWsTransport {
    /// Connects to a WebSocket endpoint and starts the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint is unreachable or the
    /// handshake fails.
    pub async fn connect(
        url: &str,
        config: WebSocketConfig,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Self> {
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async_with_config(url, Some(config), true)
                .await
                .map_err(|e| Error::connection(format!("failed to connect to {url}: {e}")))?;

        info!(url = %url, "WebSocket connection established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(HandlerSlot::new(Some(handler)));
        let open = Arc::new(AtomicBool::new(true));

        let event_loop = tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&handler),
            Arc::clone(&open),
            url.to_owned(),
        ));

        Ok(Self {
            url: url.to_owned(),
            command_tx,
            handler,
            open,
            closing: AtomicBool::new(false),
            event_loop: Mutex::new(Some(event_loop)),
        })
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        handler: Arc<HandlerSlot>,
        open: Arc<AtomicBool>,
        url: String,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming frames from the remote end
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(url = %url, len = text.len(), "Frame received");
                            handler.deliver(text.as_str());
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(url = %url, "WebSocket closed by remote");
                            break String::from("closed by remote");
                        }

                        Some(Err(e)) => {
                            error!(url = %url, error = %e, "WebSocket error");
                            break format!("socket error: {e}");
                        }

                        None => {
                            debug!(url = %url, "WebSocket stream ended");
                            break String::from("stream ended");
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the client
                command = command_rx.recv() => {
                    match command {
                        Some(TransportCommand::Send { frame, ack }) => {
                            let result = ws_write
                                .send(Message::Text(frame.into()))
                                .await
                                .map_err(Error::from);
                            if result.is_ok() {
                                trace!(url = %url, "Frame sent");
                            }
                            let _ = ack.send(result);
                        }

                        Some(TransportCommand::Shutdown) => {
                            debug!(url = %url, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break String::from("closed locally");
                        }

                        None => {
                            debug!(url = %url, "Command channel closed");
                            break String::from("transport dropped");
                        }
                    }
                }
            }
        };

        open.store(false, Ordering::SeqCst);

        // Fail sends that were queued behind the shutdown
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            if let TransportCommand::Send { ack, .. } = command {
                let _ = ack.send(Err(Error::ConnectionClosed));
            }
        }

        handler.closed(&reason);

        debug!(url = %url, reason = %reason, "Event loop terminated");
    }
}

#[async_trait]
impl Transport for AsyncWsTransport {
    fn kind(&self) -> &'static str {
        "tungstenite"
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.closing.load(Ordering::SeqCst)
    }

    fn set_handler(&self, handler: Arc<dyn FrameHandler>) {
        self.handler.set(handler);
    }

    async fn send(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(TransportCommand::Send { frame, ack: ack_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        ack_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    async fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.command_tx.send(TransportCommand::Shutdown);

        let event_loop = self.event_loop.lock().take();
        if let Some(event_loop) = event_loop
            && timeout(CLOSE_TIMEOUT, event_loop).await.is_err()
        {
            warn!(url = %self.url, "Event loop did not stop in time");
        }

        self.open.store(false, Ordering::SeqCst);
        debug!(url = %self.url, "Transport closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
