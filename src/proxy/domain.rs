//! Domain trait and the proxy backing every domain interface.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::RpcClient;
use crate::error::Result;
use crate::protocol::decode_payload;

use super::strategy::MethodSignature;

// ============================================================================
// Domain
// ============================================================================

/// A typed interface over one protocol domain.
///
/// Implemented by the structs the `domain!` macro declares.
pub trait Domain: Sized {
    /// Domain name, e.g. `Page`.
    const NAME: &'static str;

    /// Wraps a proxy bound to a client.
    fn from_proxy(proxy: DomainProxy) -> Self;
}

// ============================================================================
// DomainProxy
// ============================================================================

/// Turns domain method calls into client calls.
#[derive(Debug, Clone)]
pub struct DomainProxy {
    client: RpcClient,
    domain: &'static str,
}

impl DomainProxy {
    pub(crate) fn new(client: RpcClient, domain: &'static str) -> Self {
        Self { client, domain }
    }

    /// Returns the domain name.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// Returns the underlying client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Invokes a method and decodes its result into `R`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidArgument`] on an argument-count mismatch
    /// - [`crate::Error::Serialization`] if the result does not fit `R`
    /// - any error of [`RpcClient::execute`], unchanged
    pub async fn call<R: DeserializeOwned>(
        &self,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<R> {
        let strategy = self.client.proxy_cache().strategy(signature);
        let call = strategy.to_call(args)?;
        let payload = self.client.execute(call).await?.unwrap_or(Value::Null);
        decode_payload(strategy.wire_method(), payload)
    }

    /// Invokes a method that returns nothing.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), minus decoding.
    pub async fn call_void(&self, signature: &MethodSignature, args: Vec<Value>) -> Result<()> {
        let strategy = self.client.proxy_cache().strategy(signature);
        let call = strategy.to_call(args)?;
        self.client.execute(call).await.map(|_| ())
    }
}
