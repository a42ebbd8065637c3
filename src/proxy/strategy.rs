//! Method signatures and the per-client strategy cache.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use crate::client::Call;
use crate::error::{Error, Result};
use crate::protocol::{Params, ReturnShape};

// ============================================================================
// MethodSignature
// ============================================================================

/// Static description of one domain method.
///
/// The `domain!` macro emits one `static` per generated method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    /// Domain name, e.g. `Page`.
    pub domain: &'static str,
    /// Command name within the domain, e.g. `navigate`.
    pub method: &'static str,
    /// Wire names of the parameters, in argument order.
    pub params: &'static [&'static str],
    /// What the method returns.
    pub returns: ReturnShape,
}

// ============================================================================
// InvocationStrategy
// ============================================================================

/// Prepared translation from ordered arguments to a [`Call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationStrategy {
    wire_method: String,
    params: &'static [&'static str],
    returns: ReturnShape,
}

impl InvocationStrategy {
    /// Builds the strategy for a signature.
    #[must_use]
    pub fn new(signature: &MethodSignature) -> Self {
        Self {
            wire_method: format!("{}.{}", signature.domain, signature.method),
            params: signature.params,
            returns: signature.returns,
        }
    }

    /// Returns the joined `Domain.command` name.
    #[inline]
    #[must_use]
    pub fn wire_method(&self) -> &str {
        &self.wire_method
    }

    /// Returns the return shape.
    #[inline]
    #[must_use]
    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    /// Maps ordered arguments onto parameter names.
    ///
    /// `null` arguments (unset options) are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the argument count differs
    /// from the parameter count.
    pub fn build_params(&self, args: Vec<Value>) -> Result<Params> {
        if args.len() != self.params.len() {
            return Err(Error::invalid_argument(format!(
                "{} takes {} argument(s), got {}",
                self.wire_method,
                self.params.len(),
                args.len()
            )));
        }

        Ok(self
            .params
            .iter()
            .zip(args)
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| ((*name).to_owned(), value))
            .collect())
    }

    /// Builds the call for `args`.
    ///
    /// # Errors
    ///
    /// As [`build_params`](Self::build_params).
    pub fn to_call(&self, args: Vec<Value>) -> Result<Call> {
        Ok(Call::new(self.wire_method.clone())
            .params(self.build_params(args)?)
            .returns(self.returns))
    }
}

/// Converts one method argument to its wire value.
///
/// # Errors
///
/// Returns [`Error::Json`] if the value cannot be serialized.
pub fn to_argument<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

// ============================================================================
// ProxyCache
// ============================================================================

type SignatureKey = (&'static str, &'static str);

/// Strategies keyed by `(domain, method)`, shared by every proxy of a client.
#[derive(Debug, Default)]
pub struct ProxyCache {
    strategies: RwLock<FxHashMap<SignatureKey, Arc<InvocationStrategy>>>,
}

impl ProxyCache {
    /// Returns the cached strategy for `signature`, building it on first use.
    pub fn strategy(&self, signature: &MethodSignature) -> Arc<InvocationStrategy> {
        let key = (signature.domain, signature.method);

        if let Some(strategy) = self.strategies.read().get(&key) {
            return Arc::clone(strategy);
        }

        let mut strategies = self.strategies.write();
        Arc::clone(
            strategies
                .entry(key)
                .or_insert_with(|| Arc::new(InvocationStrategy::new(signature))),
        )
    }

    /// Returns the number of cached strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.read().len()
    }

    /// Returns `true` if nothing is cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
