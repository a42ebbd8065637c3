//! RPC client: call orchestration, event subscriptions and shutdown.
//!
//! # Example
//!
//! ```no_run
//! use devtools_rpc::RpcClient;
//! use serde_json::json;
//!
//! # async fn example() -> devtools_rpc::Result<()> {
//! let client = RpcClient::connect("ws://127.0.0.1:9222/devtools/browser/abc").await?;
//!
//! client.invoke_void("Page.enable", ()).await?;
//! let result = client
//!     .invoke("Page.navigate", json!({ "url": "https://example.com" }))
//!     .await?;
//! println!("frame: {}", result["frameId"]);
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::dispatch::{ChannelHandler, Dispatcher};
use crate::error::{Error, Result};
use crate::identifiers::{CallId, IdGenerator, ListenerId, SessionId};
use crate::metrics::{MetricsSnapshot, RpcMetrics};
use crate::protocol::{
    Event, Invocation, Params, ReturnShape, RpcResult, decode_payload, event_key, to_params,
};
use crate::proxy::{Domain, DomainProxy, ProxyCache};
use crate::transport::{Channel, Transport, TransportFactory};

use super::builder::ClientBuilder;
use super::options::ClientOptions;
use super::routing::RoutingTable;

// ============================================================================
// Call
// ============================================================================

/// A fully described invocation.
///
/// The general form behind every `invoke*` method.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method in `Domain.command` format.
    pub method: String,
    /// Command parameters.
    pub params: Params,
    /// Target session, if the command is session-scoped.
    pub session_id: Option<SessionId>,
    /// Read timeout override for this call.
    pub timeout: Option<Duration>,
    /// What to extract from a successful payload.
    pub returns: ReturnShape,
}

impl Call {
    /// Creates a call with empty params and the default return shape.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Params::new(),
            session_id: None,
            timeout: None,
            returns: ReturnShape::Payload,
        }
    }

    /// Sets params from any value serializing to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `params` is not object-shaped.
    pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self> {
        self.params = to_params(params)?;
        Ok(self)
    }

    /// Sets an already-built params object.
    #[inline]
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Routes the call to a target session.
    #[inline]
    #[must_use]
    pub fn session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Overrides the read timeout.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the return shape.
    #[inline]
    #[must_use]
    pub fn returns(mut self, returns: ReturnShape) -> Self {
        self.returns = returns;
        self
    }

    fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }
}

// ============================================================================
// Types
// ============================================================================

/// Shared state of one connection.
pub(crate) struct ClientInner {
    browser: Arc<dyn Transport>,
    page: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    ids: IdGenerator,
    routing: RoutingTable,
    options: ClientOptions,
    metrics: Arc<RpcMetrics>,
    proxies: ProxyCache,
    closing: AtomicBool,
    skip_grace: Notify,
    terminated: watch::Sender<bool>,
}

/// Unsubscribes a call when its future finishes or is dropped.
struct SubscriptionGuard<'a> {
    dispatcher: &'a Dispatcher,
    id: CallId,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.id);
    }
}

/// Ends the drain early if the first `close()` caller stops waiting.
struct CloseGuard<'a> {
    inner: &'a ClientInner,
    armed: bool,
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Close abandoned, skipping remaining grace");
            self.inner.skip_grace.notify_one();
        }
    }
}

// ============================================================================
// RpcClient
// ============================================================================

/// Client for one debugging connection.
///
/// Multiplexes any number of concurrent calls over a browser-level and a
/// page-level transport. Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct RpcClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("browser", &self.inner.browser.url())
            .field("page", &self.inner.page.url())
            .field("pending", &self.inner.dispatcher.pending_count())
            .field("closing", &self.inner.closing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RpcClient - Constructors
// ============================================================================

impl RpcClient {
    /// Returns a builder for configuring a connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connects to a browser WebSocket URL with default options.
    ///
    /// Both channels open a socket to `browser_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint is unreachable.
    pub async fn connect(browser_url: impl Into<String>) -> Result<Self> {
        Self::builder().browser_url(browser_url).connect().await
    }

    /// Assembles a client over already-built transports.
    ///
    /// Registers the client's frame handlers on both transports.
    #[must_use]
    pub fn with_transports(
        browser: Arc<dyn Transport>,
        page: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Self {
        Self::with_routing(browser, page, options, RoutingTable::default())
    }

    /// Like [`with_transports`](Self::with_transports) with a custom routing table.
    #[must_use]
    pub fn with_routing(
        browser: Arc<dyn Transport>,
        page: Arc<dyn Transport>,
        options: ClientOptions,
        routing: RoutingTable,
    ) -> Self {
        let metrics = Arc::new(RpcMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&metrics)));

        browser.set_handler(Arc::new(ChannelHandler::new(
            Channel::Browser,
            Arc::clone(&dispatcher),
        )));
        page.set_handler(Arc::new(ChannelHandler::new(
            Channel::Page,
            Arc::clone(&dispatcher),
        )));

        Self::assemble(browser, page, dispatcher, metrics, options, routing)
    }

    /// Opens both WebSocket channels and assembles a client.
    pub(crate) async fn open(
        browser_url: &str,
        page_url: &str,
        options: ClientOptions,
        routing: RoutingTable,
    ) -> Result<Self> {
        let metrics = Arc::new(RpcMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&metrics)));
        let factory = TransportFactory::new(&options);

        let handler = ChannelHandler::new(Channel::Browser, Arc::clone(&dispatcher));
        let browser = factory.connect(browser_url, Arc::new(handler)).await?;

        let handler = ChannelHandler::new(Channel::Page, Arc::clone(&dispatcher));
        let page = match factory.connect(page_url, Arc::new(handler)).await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await;
                return Err(e);
            }
        };

        info!(
            browser = %browser_url,
            page = %page_url,
            backend = %factory.backend(),
            "Client connected"
        );

        Ok(Self::assemble(browser, page, dispatcher, metrics, options, routing))
    }

    fn assemble(
        browser: Arc<dyn Transport>,
        page: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<RpcMetrics>,
        options: ClientOptions,
        routing: RoutingTable,
    ) -> Self {
        let (terminated, _) = watch::channel(false);

        Self {
            inner: Arc::new(ClientInner {
                browser,
                page,
                dispatcher,
                ids: IdGenerator::new(),
                routing,
                options,
                metrics,
                proxies: ProxyCache::default(),
                closing: AtomicBool::new(false),
                skip_grace: Notify::new(),
                terminated,
            }),
        }
    }
}

// ============================================================================
// RpcClient - Invocation
// ============================================================================

impl RpcClient {
    /// Invokes `method` and returns the raw result payload.
    ///
    /// `params` must serialize to a JSON object; `()` sends `{}`.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the remote end reports a failure
    /// - [`Error::Timeout`] if no response arrives in time
    /// - [`Error::ConnectionClosed`] if the client is closing
    pub async fn invoke<P>(&self, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        let call = Call::new(method).with_params(&params)?;
        Ok(self.execute(call).await?.unwrap_or(Value::Null))
    }

    /// Invokes `method` and decodes the payload into `T`.
    ///
    /// # Errors
    ///
    /// As [`invoke`](Self::invoke), plus [`Error::Serialization`] if the
    /// payload does not fit `T`.
    pub async fn invoke_as<T, P>(&self, method: &str, params: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let payload = self.invoke(method, params).await?;
        decode_payload(method, payload)
    }

    /// Invokes `method` and discards the payload.
    ///
    /// # Errors
    ///
    /// As [`invoke`](Self::invoke).
    pub async fn invoke_void<P>(&self, method: &str, params: P) -> Result<()>
    where
        P: Serialize,
    {
        let call = Call::new(method)
            .with_params(&params)?
            .returns(ReturnShape::Void);
        self.execute(call).await.map(|_| ())
    }

    /// Invokes a session-scoped `method`.
    ///
    /// # Errors
    ///
    /// As [`invoke`](Self::invoke).
    pub async fn invoke_in_session<P>(
        &self,
        session_id: impl Into<SessionId>,
        method: &str,
        params: P,
    ) -> Result<Value>
    where
        P: Serialize,
    {
        let call = Call::new(method)
            .with_params(&params)?
            .session(session_id);
        Ok(self.execute(call).await?.unwrap_or(Value::Null))
    }

    /// Executes a call and applies its return shape.
    ///
    /// Returns `Ok(None)` only for [`ReturnShape::Void`]; a remote `null`
    /// payload is `Ok(Some(Value::Null))`.
    ///
    /// # Errors
    ///
    /// As [`invoke`](Self::invoke).
    pub async fn execute(&self, call: Call) -> Result<Option<Value>> {
        let (call_id, result) = self.round_trip(&call).await?;

        match result {
            RpcResult::Success(payload) => call.returns.apply(&call.method, payload),
            RpcResult::Failure(error) => {
                debug!(
                    call_id = %call_id,
                    method = %call.method,
                    code = error.code,
                    message = %error.message,
                    "Call failed"
                );
                Err(Error::Rpc {
                    code: error.code,
                    message: error.message,
                    data: error.data,
                    method: call.method,
                    params: Value::Object(call.params),
                    call_id,
                })
            }
        }
    }

    /// Executes a call and returns the raw result.
    ///
    /// A remote failure is returned as [`RpcResult::Failure`] instead of
    /// [`Error::Rpc`].
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`], transport errors and cancellation.
    pub async fn invoke_raw(&self, call: Call) -> Result<RpcResult> {
        self.round_trip(&call).await.map(|(_, result)| result)
    }

    async fn round_trip(&self, call: &Call) -> Result<(CallId, RpcResult)> {
        let inner = &self.inner;
        if inner.closing.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        let id = inner.ids.next_id();
        let channel = inner.routing.route(&call.method);
        let transport = self.transport(channel);

        let pending = inner.dispatcher.subscribe(id, &call.method, channel)?;
        let _guard = SubscriptionGuard {
            dispatcher: &inner.dispatcher,
            id,
        };
        inner.metrics.call_started(call.domain());

        let frame = Invocation::new(id, call.method.clone(), call.params.clone())
            .with_session(call.session_id.clone())
            .encode()?;

        trace!(call_id = %id, method = %call.method, channel = %channel, "Sending call");
        if let Err(e) = transport.send(frame).await {
            inner.metrics.transport_error();
            debug!(call_id = %id, method = %call.method, error = %e, "Send failed");
            return Err(e);
        }

        let limit = call.timeout.unwrap_or(inner.options.read_timeout);
        let started = Instant::now();

        match tokio::time::timeout(limit, pending).await {
            Ok(outcome) => outcome.map(|result| (id, result)),
            Err(_) => {
                let elapsed = started.elapsed().as_millis();
                let elapsed_ms = u64::try_from(elapsed).unwrap_or(u64::MAX);
                inner.metrics.timeout(call.domain());
                debug!(call_id = %id, method = %call.method, elapsed_ms, "Call timed out");
                Err(Error::timeout(call.method.clone(), id, elapsed_ms))
            }
        }
    }

    fn transport(&self, channel: Channel) -> &Arc<dyn Transport> {
        match channel {
            Channel::Browser => &self.inner.browser,
            Channel::Page => &self.inner.page,
        }
    }
}

// ============================================================================
// RpcClient - Events
// ============================================================================

impl RpcClient {
    /// Registers a listener for `domain.event` notifications.
    ///
    /// The handler runs on the transport's reader; hand long work off to a
    /// task.
    pub fn add_event_listener<F>(&self, domain: &str, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .dispatcher
            .register_listener(event_key(domain, event), Arc::new(handler))
    }

    /// Registers a listener receiving `params` decoded into `T`.
    ///
    /// Events whose params do not decode are logged and skipped.
    pub fn add_typed_listener<T, F>(&self, domain: &str, event: &str, handler: F) -> ListenerId
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.add_event_listener(domain, event, move |event: &Event| {
            match event.params_as::<T>() {
                Ok(params) => handler(params),
                Err(e) => warn!(method = %event.method, error = %e, "Skipping undecodable event"),
            }
        })
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let removed = self.inner.dispatcher.unregister_listener(id);
        if removed {
            debug!(listener_id = %id, "Listener removed");
        }
        removed
    }
}

// ============================================================================
// RpcClient - Domains
// ============================================================================

impl RpcClient {
    /// Returns a domain interface bound to this client.
    ///
    /// ```ignore
    /// let page = client.domain::<Page>();
    /// page.enable().await?;
    /// ```
    #[must_use]
    pub fn domain<D: Domain>(&self) -> D {
        D::from_proxy(DomainProxy::new(self.clone(), D::NAME))
    }

    pub(crate) fn proxy_cache(&self) -> &ProxyCache {
        &self.inner.proxies
    }
}

// ============================================================================
// RpcClient - State & Shutdown
// ============================================================================

impl RpcClient {
    /// Returns `true` while the client is not closing and both transports
    /// are open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closing.load(Ordering::SeqCst)
            && self.inner.browser.is_open()
            && self.inner.page.is_open()
    }

    /// Returns the number of calls awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.dispatcher.pending_count()
    }

    /// Returns a snapshot of this connection's counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Returns the options the client was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Closes the connection.
    ///
    /// The first call waits up to `shutdown_grace` for pending calls to
    /// drain, closes both transports, fails leftover calls with
    /// [`Error::Cancelled`] and drops every listener. Concurrent and later
    /// calls wait for that to finish.
    ///
    /// Shutdown runs on its own task. Dropping the first `close()` future
    /// ends the drain early; the rest of the shutdown still completes.
    pub async fn close(&self) {
        let inner = &self.inner;
        if inner.closing.swap(true, Ordering::SeqCst) {
            self.await_termination().await;
            return;
        }

        info!(pending = inner.dispatcher.pending_count(), "Closing client");

        let mut guard = CloseGuard { inner, armed: true };
        let task = tokio::spawn(shutdown(Arc::clone(inner)));
        if let Err(e) = task.await {
            warn!(error = %e, "Shutdown task failed");
            inner.dispatcher.shutdown("client closed");
            inner.terminated.send_replace(true);
        }
        guard.armed = false;
    }

    /// Waits until [`close`](Self::close) has finished.
    pub async fn await_termination(&self) {
        let mut terminated = self.inner.terminated.subscribe();
        let _ = terminated.wait_for(|done| *done).await;
    }

    /// Waits up to `limit` for termination. Returns `true` if terminated.
    pub async fn await_termination_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.await_termination())
            .await
            .is_ok()
    }
}

async fn shutdown(inner: Arc<ClientInner>) {
    let drained = tokio::select! {
        drained = inner.dispatcher.wait_drained(inner.options.shutdown_grace) => drained,
        () = inner.skip_grace.notified() => false,
    };
    if !drained {
        debug!(
            pending = inner.dispatcher.pending_count(),
            "Closing with calls pending"
        );
    }

    tokio::join!(inner.browser.close(), inner.page.close());
    let cancelled = inner.dispatcher.shutdown("client closed");

    inner.terminated.send_replace(true);
    info!(cancelled, "Client closed");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::transport::memory::{self, MemoryPeer};

    fn memory_client(options: ClientOptions) -> (RpcClient, MemoryPeer, MemoryPeer) {
        memory::init_tracing();
        let (browser, browser_peer) = memory::pair("memory://browser");
        let (page, page_peer) = memory::pair("memory://page");
        let client = RpcClient::with_transports(Arc::new(browser), Arc::new(page), options);
        (client, browser_peer, page_peer)
    }

    fn call_id(frame: &Value) -> u64 {
        frame["id"].as_u64().expect("numeric id")
    }

    #[tokio::test]
    async fn test_routing_by_namespace() {
        let (client, mut browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let target = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .invoke("Target.attachToTarget", json!({ "targetId": "T1" }))
                    .await
            }
        });
        let sent = browser_peer.recv_json().await.expect("browser frame");
        assert_eq!(sent["method"], "Target.attachToTarget");
        assert_eq!(sent["params"], json!({ "targetId": "T1" }));
        assert!(page_peer.try_recv().is_none());
        browser_peer.respond(call_id(&sent), json!({ "sessionId": "S1" }));
        assert_eq!(
            target.await.expect("join").expect("call"),
            json!({ "sessionId": "S1" })
        );

        let navigate = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .invoke("Page.navigate", json!({ "url": "https://example.com" }))
                    .await
            }
        });
        let sent = page_peer.recv_json().await.expect("page frame");
        assert_eq!(sent["method"], "Page.navigate");
        assert!(browser_peer.try_recv().is_none());
        page_peer.respond(call_id(&sent), json!({ "frameId": "F1" }));
        assert_eq!(
            navigate.await.expect("join").expect("call")["frameId"],
            "F1"
        );
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.invoke("Runtime.enable", ()).await })
            })
            .collect();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let sent = page_peer.recv_json().await.expect("frame");
            assert_eq!(sent["params"], json!({}));
            ids.push(call_id(&sent));
        }
        for id in ids.iter().rev() {
            page_peer.respond(*id, json!({ "id": id }));
        }
        for call in calls {
            call.await.expect("join").expect("call");
        }

        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_then_navigate_times_out_against_slow_responder() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let responder = tokio::spawn(async move {
            let enable = page_peer.recv_json().await.expect("enable");
            page_peer.respond(call_id(&enable), json!({}));

            let navigate = page_peer.recv_json().await.expect("navigate");
            tokio::time::sleep(Duration::from_millis(6000)).await;
            page_peer.respond(call_id(&navigate), json!({ "frameId": "late" }));
            page_peer
        });

        client.invoke_void("Page.enable", ()).await.expect("enable");

        let started = Instant::now();
        let call = Call::new("Page.navigate")
            .with_params(&json!({ "url": "https://example.com" }))
            .expect("params")
            .timeout(Duration::from_millis(5000));
        let err = client.execute(call).await.unwrap_err();

        match err {
            Error::Timeout {
                ref method,
                elapsed_ms,
                ..
            } => {
                assert_eq!(method, "Page.navigate");
                assert!((5000..5100).contains(&elapsed_ms), "elapsed {elapsed_ms}");
            }
            ref other => panic!("expected timeout, got {other:?}"),
        }
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(6000));
        assert_eq!(client.pending_count(), 0);

        let _peer = responder.await.expect("responder");
        let metrics = client.metrics();
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.calls_succeeded, 1);
        assert_eq!(metrics.frames_dropped, 1);
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn test_rpc_error_carries_call_context() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .invoke("Runtime.evaluate", json!({ "expression": "1+" }))
                    .await
            }
        });
        let sent = page_peer.recv_json().await.expect("frame");
        page_peer.respond_error(call_id(&sent), -32000, "SyntaxError");

        match call.await.expect("join").unwrap_err() {
            Error::Rpc {
                code,
                message,
                method,
                params,
                call_id: id,
                ..
            } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "SyntaxError");
                assert_eq!(method, "Runtime.evaluate");
                assert_eq!(params, json!({ "expression": "1+" }));
                assert_eq!(id.as_u64(), call_id(&sent));
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
        assert_eq!(client.metrics().rpc_failures, 1);
    }

    #[tokio::test]
    async fn test_invoke_raw_returns_failure_without_raising() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.invoke_raw(Call::new("DOM.getDocument")).await }
        });
        let sent = page_peer.recv_json().await.expect("frame");
        page_peer.respond_error(call_id(&sent), -32601, "not found");

        match call.await.expect("join").expect("raw") {
            RpcResult::Failure(error) => assert_eq!(error.code, -32601),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_void_null_and_payload_are_distinct() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let responder = tokio::spawn(async move {
            for result in [json!({ "ignored": true }), Value::Null, json!({ "value": 3 })] {
                let sent = page_peer.recv_json().await.expect("frame");
                page_peer.respond(call_id(&sent), result);
            }
        });

        let void = client
            .execute(Call::new("Page.enable").returns(ReturnShape::Void))
            .await
            .expect("void");
        assert_eq!(void, None);

        let null = client
            .execute(Call::new("Runtime.noop"))
            .await
            .expect("null");
        assert_eq!(null, Some(Value::Null));

        let field = client
            .execute(Call::new("Runtime.get").returns(ReturnShape::Field("value")))
            .await
            .expect("field");
        assert_eq!(field, Some(json!(3)));

        responder.await.expect("responder");
    }

    #[tokio::test]
    async fn test_invoke_as_reports_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Version {
            #[allow(dead_code)]
            product: String,
        }

        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .invoke_as::<Version, _>("Browser.getVersion", ())
                    .await
            }
        });
        let sent = page_peer.recv_json().await.expect("frame");
        page_peer.respond(call_id(&sent), json!([1, 2]));

        match call.await.expect("join").unwrap_err() {
            Error::Serialization {
                method,
                expected,
                actual,
                ..
            } => {
                assert_eq!(method, "Browser.getVersion");
                assert!(expected.ends_with("Version"));
                assert_eq!(actual, "array");
            }
            other => panic!("expected serialization error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_id_is_sent() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .invoke_in_session("S-7", "Runtime.evaluate", json!({ "expression": "1" }))
                    .await
            }
        });
        let sent = page_peer.recv_json().await.expect("frame");
        assert_eq!(sent["sessionId"], "S-7");
        page_peer.respond(call_id(&sent), json!({}));
        call.await.expect("join").expect("call");
    }

    #[tokio::test]
    async fn test_non_object_params_are_rejected() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let err = client
            .invoke("Page.navigate", "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(page_peer.try_recv().is_none());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_event_listeners() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct LoadEvent {
            timestamp: f64,
        }

        let (client, _browser_peer, page_peer) = memory_client(ClientOptions::new());
        let raw = Arc::new(Mutex::new(Vec::new()));
        let typed = Arc::new(Mutex::new(Vec::new()));

        let raw_id = client.add_event_listener("Page", "loadEventFired", {
            let raw = Arc::clone(&raw);
            move |event: &Event| raw.lock().push(event.params.clone())
        });
        client.add_typed_listener("Page", "loadEventFired", {
            let typed = Arc::clone(&typed);
            move |event: LoadEvent| typed.lock().push(event)
        });

        page_peer.emit("Page.loadEventFired", json!({ "timestamp": 1.0 }));
        page_peer.emit("Page.loadEventFired", json!({ "timestamp": "bad" }));
        assert!(client.remove_event_listener(raw_id));
        page_peer.emit("Page.loadEventFired", json!({ "timestamp": 3.0 }));

        assert_eq!(
            *raw.lock(),
            vec![json!({ "timestamp": 1.0 }), json!({ "timestamp": "bad" })]
        );
        assert_eq!(
            *typed.lock(),
            vec![LoadEvent { timestamp: 1.0 }, LoadEvent { timestamp: 3.0 }]
        );
    }

    #[tokio::test]
    async fn test_close_cancels_pending_and_rejects_new_calls() {
        let options = ClientOptions::new().with_shutdown_grace(Duration::ZERO);
        let (client, _browser_peer, mut page_peer) = memory_client(options);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.invoke("Page.reload", ()).await }
        });
        page_peer.recv_json().await.expect("frame");

        client.close().await;

        let err = pending.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::Cancelled { ref method, .. } if method == "Page.reload"));
        assert!(err.is_connection_error());
        assert!(!client.is_open());
        assert!(matches!(
            client.invoke("Page.enable", ()).await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_calls_within_grace() {
        let options = ClientOptions::new().with_shutdown_grace(Duration::from_secs(5));
        let (client, _browser_peer, mut page_peer) = memory_client(options);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.invoke("Page.reload", ()).await }
        });
        let sent = page_peer.recv_json().await.expect("frame");

        let responder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            page_peer.respond(call_id(&sent), json!({}));
        });

        client.close().await;
        assert_eq!(pending.await.expect("join").expect("call"), json!({}));
        responder.await.expect("responder");
    }

    #[tokio::test]
    async fn test_concurrent_close_is_idempotent() {
        let (client, _browser_peer, _page_peer) = memory_client(ClientOptions::new());

        let closers: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.close().await })
            })
            .collect();
        for closer in closers {
            closer.await.expect("close");
        }
        client.close().await;

        assert!(!client.is_open());
        assert!(
            client
                .await_termination_timeout(Duration::from_millis(100))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_close_still_shuts_down() {
        let options = ClientOptions::new().with_shutdown_grace(Duration::from_secs(10));
        let (client, _browser_peer, mut page_peer) = memory_client(options);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.invoke("Page.reload", ()).await }
        });
        page_peer.recv_json().await.expect("frame");

        let started = Instant::now();
        let first = tokio::time::timeout(Duration::from_millis(20), client.close()).await;
        assert!(first.is_err());

        let second = tokio::time::timeout(Duration::from_secs(2), client.close()).await;
        assert!(second.is_ok(), "second close did not finish");
        assert!(started.elapsed() < Duration::from_secs(10));

        assert!(matches!(
            pending.await.expect("join"),
            Err(Error::Cancelled { .. })
        ));
        assert!(!client.inner.browser.is_open());
        assert!(!client.inner.page.is_open());
        assert_eq!(client.pending_count(), 0);
        assert!(client.await_termination_timeout(Duration::ZERO).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_leaves_other_calls_pending() {
        let (client, _browser_peer, mut page_peer) = memory_client(ClientOptions::new());

        let slow = Call::new("Runtime.evaluate").timeout(Duration::from_millis(100));
        let (slow_result, sent) = tokio::join!(client.execute(slow), page_peer.recv_json());
        assert!(slow_result.unwrap_err().is_timeout());
        let late_id = call_id(&sent.expect("slow frame"));
        assert_eq!(client.pending_count(), 0);

        let next_call = client.invoke("Runtime.evaluate", json!({ "expression": "2" }));
        let mut next = task::spawn(next_call);
        assert_pending!(next.poll());
        let next_id = call_id(&page_peer.recv_json().await.expect("next frame"));
        assert_ne!(next_id, late_id);

        page_peer.respond(late_id, json!({ "value": "late" }));
        assert!(!next.is_woken());
        assert_pending!(next.poll());
        assert_eq!(client.pending_count(), 1);

        page_peer.respond(next_id, json!({ "value": "fresh" }));
        assert!(next.is_woken());
        let result = assert_ready!(next.poll()).expect("call");
        assert_eq!(result, json!({ "value": "fresh" }));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.metrics().frames_dropped, 1);
    }

    #[tokio::test]
    async fn test_remote_disconnect_fails_that_channel() {
        let (client, browser_peer, _page_peer) = memory_client(ClientOptions::new());

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.invoke("Target.getTargets", ()).await }
        });
        while client.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        browser_peer.disconnect();

        assert!(matches!(
            pending.await.expect("join"),
            Err(Error::Cancelled { .. })
        ));
        assert!(!client.is_open());
        assert!(matches!(
            client.invoke("Target.getTargets", ()).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
