//! Transport backend selection.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

use crate::client::ClientOptions;
use crate::error::Result;

use super::{
    AsyncWsTransport, BlockingWsTransport, FrameHandler, Transport, TransportBackend,
};

// ============================================================================
// TransportFactory
// ============================================================================

/// Builds transports for the backend named in [`ClientOptions`].
#[derive(Debug, Clone)]
pub struct TransportFactory {
    backend: TransportBackend,
    config: WebSocketConfig,
}

impl TransportFactory {
    /// Creates a factory from client options.
    #[must_use]
    pub fn new(options: &ClientOptions) -> Self {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(options.inbound_buffer_size);
        config.max_frame_size = Some(options.inbound_buffer_size);

        Self {
            backend: options.backend,
            config,
        }
    }

    /// Returns the backend this factory builds.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> TransportBackend {
        self.backend
    }

    /// Connects a new transport and registers its frame handler.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connection`] if the endpoint is unreachable
    /// or the handshake fails.
    pub async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Arc<dyn Transport>> {
        debug!(url = %url, backend = %self.backend, "Connecting transport");

        let config = self.config.clone();
        let transport: Arc<dyn Transport> = match self.backend {
            TransportBackend::Tungstenite => {
                Arc::new(AsyncWsTransport::connect(url, config, handler).await?)
            }
            TransportBackend::Blocking => {
                Arc::new(BlockingWsTransport::connect(url, config, handler).await?)
            }
        };

        Ok(transport)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::memory::RecordingHandler;

    #[test]
    fn test_defaults_to_tungstenite() {
        let factory = TransportFactory::new(&ClientOptions::default());
        assert_eq!(factory.backend(), TransportBackend::Tungstenite);
    }

    #[test]
    fn test_inbound_buffer_size_applies_to_config() {
        let options = ClientOptions::new()
            .with_backend(TransportBackend::Blocking)
            .with_inbound_buffer_size(1024);
        let factory = TransportFactory::new(&options);

        assert_eq!(factory.backend(), TransportBackend::Blocking);
        assert_eq!(factory.config.max_message_size, Some(1024));
        assert_eq!(factory.config.max_frame_size, Some(1024));
    }

    #[tokio::test]
    async fn test_connect_failure_is_typed() {
        let factory = TransportFactory::new(&ClientOptions::default());
        let err = factory
            .connect("ws://127.0.0.1:1", Arc::new(RecordingHandler::default()))
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }
}
