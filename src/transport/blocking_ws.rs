//! Blocking WebSocket transport.
//!
//! Runs the synchronous tungstenite client on a dedicated OS thread. The
//! socket gets a short read timeout so queued sends interleave with reads;
//! a send therefore waits at most [`POLL_INTERVAL`] before it is written.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::stream::MaybeTlsStream;
use tokio_tungstenite::tungstenite::{self, Message, WebSocket};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

use super::{FrameHandler, HandlerSlot, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Socket read timeout between checks of the outgoing queue.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Time allowed for the socket thread to finish after a close request.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Redirects followed during the handshake.
const MAX_REDIRECTS: u8 = 3;

// ============================================================================
// Types
// ============================================================================

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Internal commands for the socket thread.
enum TransportCommand {
    Send {
        frame: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

// ============================================================================
// BlockingWsTransport
// ============================================================================

/// WebSocket transport backed by a blocking socket thread.
pub struct BlockingWsTransport {
    url: String,
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    handler: Arc<HandlerSlot>,
    open: Arc<AtomicBool>,
    closing: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for BlockingWsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingWsTransport")
            .field("url", &self.url)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl BlockingWsTransport {
    /// Connects to a WebSocket endpoint and starts the socket thread.
    ///
    /// The handshake runs on the blocking pool so the calling task is not
    /// stalled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint is unreachable, the
    /// handshake fails, or the socket thread cannot be spawned.
    pub async fn connect(
        url: &str,
        config: WebSocketConfig,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Self> {
        let target = url.to_owned();
        let (socket, _response) = tokio::task::spawn_blocking(move || {
            tungstenite::client::connect_with_config(target.as_str(), Some(config), MAX_REDIRECTS)
        })
        .await
        .map_err(|e| Error::connection(format!("connect task failed: {e}")))?
        .map_err(|e| Error::connection(format!("failed to connect to {url}: {e}")))?;

        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_read_timeout(Some(POLL_INTERVAL))?;
        }

        info!(url = %url, "Blocking WebSocket connection established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(HandlerSlot::new(Some(handler)));
        let open = Arc::new(AtomicBool::new(true));

        let thread = {
            let handler = Arc::clone(&handler);
            let open = Arc::clone(&open);
            let url = url.to_owned();
            thread::Builder::new()
                .name("devtools-ws".into())
                .spawn(move || Self::run_socket_loop(socket, command_rx, &handler, &open, &url))
                .map_err(|e| Error::connection(format!("failed to spawn socket thread: {e}")))?
        };

        Ok(Self {
            url: url.to_owned(),
            command_tx,
            handler,
            open,
            closing: AtomicBool::new(false),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Socket loop: drain queued sends, then read with timeout.
    fn run_socket_loop(
        mut socket: Socket,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        handler: &HandlerSlot,
        open: &AtomicBool,
        url: &str,
    ) {
        let reason = 'socket: loop {
            loop {
                match command_rx.try_recv() {
                    Ok(TransportCommand::Send { frame, ack }) => {
                        let result = socket
                            .send(Message::Text(frame.into()))
                            .map_err(Error::from);
                        if result.is_ok() {
                            trace!(url = %url, "Frame sent");
                        }
                        let _ = ack.send(result);
                    }
                    Ok(TransportCommand::Shutdown) => {
                        debug!(url = %url, "Shutdown command received");
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        break 'socket String::from("closed locally");
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        break 'socket String::from("transport dropped");
                    }
                }
            }

            match socket.read() {
                Ok(Message::Text(text)) => {
                    trace!(url = %url, len = text.len(), "Frame received");
                    handler.deliver(text.as_str());
                }
                Ok(Message::Close(_)) => {
                    debug!(url = %url, "WebSocket closed by remote");
                    break String::from("closed by remote");
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    debug!(url = %url, "WebSocket stream ended");
                    break String::from("stream ended");
                }
                Err(e) => {
                    error!(url = %url, error = %e, "WebSocket error");
                    break format!("socket error: {e}");
                }
            }
        };

        open.store(false, Ordering::SeqCst);

        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            if let TransportCommand::Send { ack, .. } = command {
                let _ = ack.send(Err(Error::ConnectionClosed));
            }
        }

        handler.closed(&reason);

        debug!(url = %url, reason = %reason, "Socket thread terminated");
    }
}

#[async_trait]
impl Transport for BlockingWsTransport {
    fn kind(&self) -> &'static str {
        "blocking"
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

        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            let join = tokio::task::spawn_blocking(move || thread.join());
            if timeout(CLOSE_TIMEOUT, join).await.is_err() {
                warn!(url = %self.url, "Socket thread did not stop in time");
            }
        }

        self.open.store(false, Ordering::SeqCst);
        debug!(url = %self.url, "Transport closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
