//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use devtools_rpc::{ClientOptions, TransportBackend};
//!
//! let options = ClientOptions::new()
//!     .with_backend(TransportBackend::Blocking)
//!     .with_read_timeout(Duration::from_secs(10));
//!
//! // Or from DEVTOOLS_* environment variables:
//! let options = ClientOptions::from_env()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::TransportBackend;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable selecting the transport backend.
pub const ENV_BACKEND: &str = "DEVTOOLS_WS_BACKEND";

/// Environment variable holding the read timeout in milliseconds.
pub const ENV_READ_TIMEOUT_MS: &str = "DEVTOOLS_READ_TIMEOUT_MS";

/// Environment variable holding the inbound buffer size in bytes.
pub const ENV_INBOUND_BUFFER_SIZE: &str = "DEVTOOLS_INBOUND_BUFFER_SIZE";

/// Environment variable holding the close drain grace in milliseconds.
pub const ENV_SHUTDOWN_GRACE_MS: &str = "DEVTOOLS_SHUTDOWN_GRACE_MS";

/// Default per-call read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default maximum inbound message size (64 MiB).
pub const DEFAULT_INBOUND_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Default drain grace period for `close()`.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2_000);

// ============================================================================
// ClientOptions
// ============================================================================

/// Connection and call configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// WebSocket backend used for both channels.
    pub backend: TransportBackend,

    /// How long a call waits for its response.
    pub read_timeout: Duration,

    /// Maximum inbound message and frame size in bytes.
    pub inbound_buffer_size: usize,

    /// How long `close()` waits for pending calls before failing them.
    pub shutdown_grace: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            backend: TransportBackend::Tungstenite,
            read_timeout: DEFAULT_READ_TIMEOUT,
            inbound_buffer_size: DEFAULT_INBOUND_BUFFER_SIZE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Reads options from `DEVTOOLS_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads options through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::new();

        if let Some(value) = lookup(ENV_BACKEND) {
            options.backend = value.trim().parse()?;
        }
        if let Some(value) = lookup(ENV_READ_TIMEOUT_MS) {
            let millis = parse_positive(ENV_READ_TIMEOUT_MS, &value)?;
            options.read_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_INBOUND_BUFFER_SIZE) {
            let size = parse_positive(ENV_INBOUND_BUFFER_SIZE, &value)?;
            options.inbound_buffer_size = usize::try_from(size).map_err(|_| {
                Error::config(format!("{ENV_INBOUND_BUFFER_SIZE} is too large: {size}"))
            })?;
        }
        if let Some(value) = lookup(ENV_SHUTDOWN_GRACE_MS) {
            let millis = parse_millis(ENV_SHUTDOWN_GRACE_MS, &value)?;
            options.shutdown_grace = Duration::from_millis(millis);
        }

        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the transport backend.
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: TransportBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the per-call read timeout.
    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the maximum inbound message size.
    #[inline]
    #[must_use]
    pub fn with_inbound_buffer_size(mut self, bytes: usize) -> Self {
        self.inbound_buffer_size = bytes;
        self
    }

    /// Sets the close drain grace period.
    #[inline]
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero read timeout or buffer size.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(Error::config("Read timeout must be greater than zero"));
        }
        if self.inbound_buffer_size == 0 {
            return Err(Error::config("Inbound buffer size must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        Error::config(format!(
            "{key} must be a non-negative integer, got `{value}`: {e}"
        ))
    })
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match parse_millis(key, value)? {
        0 => Err(Error::config(format!("{key} must be greater than zero"))),
        n => Ok(n),
    }
}

// ============================================================================
// Tests
// ============================================================================
