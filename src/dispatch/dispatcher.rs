//! Dispatcher: routes inbound frames to pending calls and listeners.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CallId, ListenerId};
use crate::metrics::RpcMetrics;
use crate::protocol::{Event, InboundFrame, RpcResult};
use crate::transport::{Channel, FrameHandler};

use super::listeners::{Listener, ListenerRegistry};
use super::pending::{PendingCall, PendingTable};

// ============================================================================
// Dispatcher
// ============================================================================

/// Correlates responses with pending calls and fans events out to listeners.
///
/// Safe to share between the reader tasks of both transports and any
/// number of callers.
pub struct Dispatcher {
    pending: PendingTable,
    listeners: ListenerRegistry,
    metrics: Arc<RpcMetrics>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher recording into `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<RpcMetrics>) -> Self {
        Self {
            pending: PendingTable::default(),
            listeners: ListenerRegistry::default(),
            metrics,
            shut_down: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Pending Calls
    // ========================================================================

    /// Registers a pending call before its frame is sent.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    /// - [`Error::Protocol`] if `id` is already pending
    pub fn subscribe(&self, id: CallId, method: &str, channel: Channel) -> Result<PendingCall> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.pending.insert(id, method, channel)
    }

    /// Forgets a pending call. Returns `false` if it was already resolved.
    ///
    /// A response arriving later for `id` is dropped.
    pub fn unsubscribe(&self, id: CallId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Returns `true` while any call awaits its response.
    #[inline]
    #[must_use]
    pub fn has_pending_calls(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the number of calls awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Waits until no call is pending, or `grace` elapses.
    ///
    /// Returns `true` if the pending table drained in time.
    pub async fn wait_drained(&self, grace: Duration) -> bool {
        self.pending.wait_drained(grace).await
    }

    /// Fails every call pending on `channel` with [`Error::Cancelled`].
    ///
    /// Returns the number of calls failed.
    pub fn fail_channel(&self, channel: Channel, reason: &str) -> usize {
        let failed = self.pending.drain_where(|entry| entry.channel == channel);
        let count = failed.len();

        for (id, entry) in failed {
            trace!(call_id = %id, method = %entry.method, "Cancelling pending call");
            let method = entry.method.clone();
            entry.complete(Err(Error::cancelled(method, reason)));
        }

        if count > 0 {
            debug!(channel = %channel, count, reason, "Failed pending calls");
            self.metrics.cancelled(count);
        }
        count
    }

    /// Fails every pending call, drops every listener, and rejects further
    /// subscriptions.
    ///
    /// Returns the number of calls failed.
    pub fn shutdown(&self, reason: &str) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);

        let failed = self.pending.drain_where(|_| true);
        let count = failed.len();
        for (_, entry) in failed {
            let method = entry.method.clone();
            entry.complete(Err(Error::cancelled(method, reason)));
        }
        if count > 0 {
            self.metrics.cancelled(count);
        }

        let listeners = self.listeners.clear();
        debug!(cancelled = count, listeners, "Dispatcher shut down");
        count
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) ran.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Registers a listener for events whose method equals `key`.
    pub fn register_listener(&self, key: impl Into<String>, listener: Listener) -> ListenerId {
        let key = key.into();
        let id = self.listeners.register(key.clone(), listener);
        trace!(listener_id = %id, key = %key, "Listener registered");
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Inbound Frames
    // ========================================================================

    /// Processes one inbound text frame.
    ///
    /// Malformed frames and responses nobody waits for are dropped; they
    /// never fail other calls.
    pub fn on_frame(&self, text: &str) {
        self.metrics.frame_received();

        match InboundFrame::decode(text) {
            Ok(InboundFrame::Response { id, result, .. }) => self.resolve(id, result),
            Ok(InboundFrame::Event(event)) => self.dispatch_event(&event),
            Ok(InboundFrame::Unreadable { id, reason }) => self.reject(id, reason),
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.metrics.frame_dropped();
            }
        }
    }

    fn resolve(&self, id: CallId, result: RpcResult) {
        let Some(entry) = self.pending.remove(id) else {
            trace!(call_id = %id, "Response for unknown call dropped");
            self.metrics.frame_dropped();
            return;
        };

        let elapsed = entry.started.elapsed();
        let domain = entry.method.split('.').next().unwrap_or_default();
        if result.is_success() {
            self.metrics.call_succeeded(elapsed);
        } else {
            self.metrics.rpc_failure(domain, elapsed);
        }

        trace!(call_id = %id, method = %entry.method, ?elapsed, "Call resolved");
        entry.complete(Ok(result));
    }

    fn reject(&self, id: CallId, reason: String) {
        warn!(call_id = %id, reason = %reason, "Unreadable response");
        self.metrics.frame_dropped();

        if let Some(entry) = self.pending.remove(id) {
            let error = Error::protocol(format!("{} response: {reason}", entry.method));
            entry.complete(Err(error));
        }
    }

    fn dispatch_event(&self, event: &Event) {
        let listeners = self.listeners.snapshot(event.key());
        if listeners.is_empty() {
            trace!(method = %event.method, "Event without listeners");
            return;
        }

        self.metrics.event_dispatched();
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(listener_id = %id, method = %event.method, "Event listener panicked");
                self.metrics.listener_panicked();
            }
        }
    }
}

// ============================================================================
// ChannelHandler
// ============================================================================

/// Frame handler binding one transport to the shared dispatcher.
///
/// When its transport closes, calls pending on that channel fail.
pub struct ChannelHandler {
    channel: Channel,
    dispatcher: Arc<Dispatcher>,
}

impl ChannelHandler {
    /// Creates a handler for `channel`.
    #[must_use]
    pub fn new(channel: Channel, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            channel,
            dispatcher,
        }
    }
}

impl FrameHandler for ChannelHandler {
    fn on_frame(&self, frame: &str) {
        self.dispatcher.on_frame(frame);
    }

    fn on_close(&self, reason: &str) {
        debug!(channel = %self.channel, reason, "Transport closed");
        self.dispatcher.fail_channel(self.channel, reason);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        crate::transport::memory::init_tracing();
        Dispatcher::new(Arc::new(RpcMetrics::new()))
    }

    fn response(id: u64, value: serde_json::Value) -> String {
        json!({ "id": id, "result": value }).to_string()
    }

    #[tokio::test]
    async fn test_response_resolves_matching_call() {
        let dispatcher = dispatcher();
        let call = dispatcher
            .subscribe(CallId::new(1), "Page.navigate", Channel::Page)
            .expect("subscribe");

        dispatcher.on_frame(&response(1, json!({ "frameId": "F1" })));

        assert_eq!(
            call.await.expect("resolved"),
            RpcResult::Success(json!({ "frameId": "F1" }))
        );
        assert!(!dispatcher.has_pending_calls());
    }

    #[tokio::test]
    async fn test_error_response_resolves_as_failure() {
        let dispatcher = dispatcher();
        let call = dispatcher
            .subscribe(CallId::new(2), "Page.navigate", Channel::Page)
            .expect("subscribe");

        dispatcher.on_frame(r#"{"id":2,"error":{"code":-32000,"message":"Cannot navigate"}}"#);

        match call.await.expect("resolved") {
            RpcResult::Failure(error) => {
                assert_eq!(error.code, -32000);
                assert_eq!(error.message, "Cannot navigate");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(dispatcher.metrics.snapshot().rpc_failures, 1);
    }

    #[tokio::test]
    async fn test_late_response_after_unsubscribe_is_dropped() {
        let dispatcher = dispatcher();
        let _call = dispatcher
            .subscribe(CallId::new(3), "Page.enable", Channel::Page)
            .expect("subscribe");

        assert!(dispatcher.unsubscribe(CallId::new(3)));
        assert!(!dispatcher.unsubscribe(CallId::new(3)));

        dispatcher.on_frame(&response(3, json!({})));
        assert_eq!(dispatcher.pending_count(), 0);
        assert_eq!(dispatcher.metrics.snapshot().frames_dropped, 1);
    }

    #[tokio::test]
    async fn test_unreadable_response_fails_its_call() {
        let dispatcher = dispatcher();
        let call = dispatcher
            .subscribe(CallId::new(2), "Runtime.evaluate", Channel::Page)
            .expect("subscribe");
        let _other = dispatcher
            .subscribe(CallId::new(3), "Page.enable", Channel::Page)
            .expect("subscribe");

        dispatcher.on_frame(r#"{"id":2,"error":{"message":"missing code"}}"#);

        match call.await {
            Err(Error::Protocol { message }) => {
                assert!(message.starts_with("Runtime.evaluate response"), "{message}");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert_eq!(dispatcher.pending_count(), 1);
        assert_eq!(dispatcher.metrics.snapshot().frames_dropped, 1);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let dispatcher = dispatcher();
        let _call = dispatcher
            .subscribe(CallId::new(1), "Page.enable", Channel::Page)
            .expect("subscribe");

        dispatcher.on_frame("not json");
        dispatcher.on_frame("[1,2,3]");
        dispatcher.on_frame(r#"{"params":{}}"#);
        dispatcher.on_frame(r#"{"method":"noDomain"}"#);

        assert_eq!(dispatcher.pending_count(), 1);
        assert_eq!(dispatcher.metrics.snapshot().frames_dropped, 4);
    }

    #[test]
    fn test_subscribe_rejects_duplicates_and_post_shutdown() {
        let dispatcher = dispatcher();
        let _call = dispatcher
            .subscribe(CallId::new(1), "A.b", Channel::Page)
            .expect("subscribe");
        assert!(matches!(
            dispatcher.subscribe(CallId::new(1), "A.b", Channel::Page),
            Err(Error::Protocol { .. })
        ));

        dispatcher.shutdown("closing");
        assert!(dispatcher.is_shut_down());
        assert!(matches!(
            dispatcher.subscribe(CallId::new(2), "A.b", Channel::Page),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_event_fans_out_to_every_listener() {
        let dispatcher = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            dispatcher.register_listener(
                "Page.loadEventFired",
                Arc::new(move |event: &Event| {
                    seen.lock().push((tag, event.params["timestamp"].clone()));
                }),
            );
        }
        dispatcher.register_listener(
            "Network.dataReceived",
            Arc::new(|_: &Event| panic!("wrong key")),
        );

        dispatcher.on_frame(r#"{"method":"Page.loadEventFired","params":{"timestamp":1.5}}"#);

        assert_eq!(
            *seen.lock(),
            vec![("first", json!(1.5)), ("second", json!(1.5))]
        );
    }

    #[test]
    fn test_unregistered_listener_stops_receiving() {
        let dispatcher = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = dispatcher.register_listener(
            "Page.frameNavigated",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.on_frame(r#"{"method":"Page.frameNavigated","params":{}}"#);
        assert!(dispatcher.unregister_listener(id));
        assert!(!dispatcher.unregister_listener(id));
        dispatcher.on_frame(r#"{"method":"Page.frameNavigated","params":{}}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let dispatcher = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));

        dispatcher.register_listener(
            "Runtime.consoleAPICalled",
            Arc::new(|_: &Event| panic!("boom")),
        );
        let counter = Arc::clone(&hits);
        dispatcher.register_listener(
            "Runtime.consoleAPICalled",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.on_frame(r#"{"method":"Runtime.consoleAPICalled","params":{}}"#);
        dispatcher.on_frame(r#"{"method":"Runtime.consoleAPICalled","params":{}}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.metrics.snapshot().listener_panics, 2);
    }

    #[tokio::test]
    async fn test_fail_channel_only_touches_that_channel() {
        let dispatcher = Arc::new(dispatcher());
        let browser_call = dispatcher
            .subscribe(CallId::new(1), "Target.getTargets", Channel::Browser)
            .expect("subscribe");
        let page_call = dispatcher
            .subscribe(CallId::new(2), "Page.enable", Channel::Page)
            .expect("subscribe");

        let handler = ChannelHandler::new(Channel::Browser, Arc::clone(&dispatcher));
        handler.on_close("closed by remote");

        match browser_call.await {
            Err(Error::Cancelled { method, reason }) => {
                assert_eq!(method, "Target.getTargets");
                assert_eq!(reason, "closed by remote");
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(dispatcher.pending_count(), 1);

        dispatcher.on_frame(&response(2, json!({})));
        assert!(page_call.await.expect("resolved").is_success());
    }

    #[tokio::test]
    async fn test_shutdown_fails_all_and_clears_listeners() {
        let dispatcher = dispatcher();
        let a = dispatcher
            .subscribe(CallId::new(1), "Target.a", Channel::Browser)
            .expect("a");
        let b = dispatcher
            .subscribe(CallId::new(2), "Page.b", Channel::Page)
            .expect("b");
        dispatcher.register_listener("Page.loadEventFired", Arc::new(|_: &Event| {}));

        assert_eq!(dispatcher.shutdown("client closed"), 2);
        assert!(matches!(a.await, Err(Error::Cancelled { .. })));
        assert!(matches!(b.await, Err(Error::Cancelled { .. })));
        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(dispatcher.metrics.snapshot().cancelled, 2);
    }

    #[tokio::test]
    async fn test_wait_drained_after_responses() {
        let dispatcher = Arc::new(dispatcher());
        let _call = dispatcher
            .subscribe(CallId::new(9), "Page.reload", Channel::Page)
            .expect("subscribe");

        let responder = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            responder.on_frame(&response(9, json!({})));
        });

        assert!(dispatcher.wait_drained(Duration::from_secs(2)).await);
    }

    proptest! {
        #[test]
        fn prop_responses_in_any_order_reach_their_callers(
            order in Just((1u64..=24).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            runtime.block_on(async {
                let dispatcher = dispatcher();
                let calls: Vec<_> = (1u64..=24)
                    .map(|id| {
                        dispatcher
                            .subscribe(CallId::new(id), "Runtime.evaluate", Channel::Page)
                            .expect("subscribe")
                    })
                    .collect();

                for id in &order {
                    dispatcher.on_frame(&response(*id, json!({ "echo": id })));
                }

                for call in calls {
                    let id = call.id().as_u64();
                    let result = call.await.expect("resolved");
                    assert_eq!(result, RpcResult::Success(json!({ "echo": id })));
                }
                assert_eq!(dispatcher.pending_count(), 0);
            });
        }
    }
}
