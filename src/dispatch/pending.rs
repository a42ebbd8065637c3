//! Pending-call table.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Notify, oneshot};

use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::RpcResult;
use crate::transport::Channel;

// ============================================================================
// Types
// ============================================================================

type Completion = oneshot::Sender<Result<RpcResult>>;

/// Bookkeeping for one issued call.
pub(crate) struct PendingEntry {
    pub method: String,
    pub channel: Channel,
    pub started: Instant,
    completion: Completion,
}

impl PendingEntry {
    /// Resolves the call. A caller that already gave up is ignored.
    pub(crate) fn complete(self, outcome: Result<RpcResult>) {
        let _ = self.completion.send(outcome);
    }
}

// ============================================================================
// PendingCall
// ============================================================================

/// Completion handle for one call, resolved exactly once by the dispatcher.
///
/// Awaiting it yields the decoded [`RpcResult`], or an error if the call
/// was force-failed. If the dispatcher disappears without resolving it,
/// the result is [`Error::ConnectionClosed`].
#[derive(Debug)]
pub struct PendingCall {
    id: CallId,
    receiver: oneshot::Receiver<Result<RpcResult>>,
}

impl PendingCall {
    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }
}

impl Future for PendingCall {
    type Output = Result<RpcResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::ConnectionClosed)))
    }
}

// ============================================================================
// PendingTable
// ============================================================================

/// Correlation id → pending call, plus a drain notification.
#[derive(Default)]
pub(crate) struct PendingTable {
    calls: Mutex<FxHashMap<CallId, PendingEntry>>,
    drained: Notify,
}

impl PendingTable {
    /// Registers a call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `id` is already pending.
    pub(crate) fn insert(&self, id: CallId, method: &str, channel: Channel) -> Result<PendingCall> {
        let (completion, receiver) = oneshot::channel();

        let mut calls = self.calls.lock();
        if calls.contains_key(&id) {
            return Err(Error::protocol(format!("duplicate call id {id}")));
        }
        calls.insert(
            id,
            PendingEntry {
                method: method.to_owned(),
                channel,
                started: Instant::now(),
                completion,
            },
        );

        Ok(PendingCall { id, receiver })
    }

    /// Removes a call without resolving it.
    pub(crate) fn remove(&self, id: CallId) -> Option<PendingEntry> {
        let (entry, now_empty) = {
            let mut calls = self.calls.lock();
            let entry = calls.remove(&id);
            (entry, calls.is_empty())
        };

        if entry.is_some() && now_empty {
            self.drained.notify_waiters();
        }
        entry
    }

    /// Removes every call matching `predicate`.
    pub(crate) fn drain_where(
        &self,
        mut predicate: impl FnMut(&PendingEntry) -> bool,
    ) -> Vec<(CallId, PendingEntry)> {
        let (drained, now_empty) = {
            let mut calls = self.calls.lock();
            let ids: Vec<CallId> = calls
                .iter()
                .filter(|(_, entry)| predicate(entry))
                .map(|(id, _)| *id)
                .collect();
            let drained: Vec<_> = ids
                .into_iter()
                .filter_map(|id| calls.remove(&id).map(|entry| (id, entry)))
                .collect();
            (drained, calls.is_empty())
        };

        if !drained.is_empty() && now_empty {
            self.drained.notify_waiters();
        }
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Waits until the table is empty or `grace` elapses.
    ///
    /// Returns `true` if the table drained.
    pub(crate) async fn wait_drained(&self, grace: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.is_empty() {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(grace, wait).await.is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
