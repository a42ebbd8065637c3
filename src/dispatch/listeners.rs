//! Event listener registry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::identifiers::ListenerId;
use crate::protocol::Event;

// ============================================================================
// Types
// ============================================================================

/// Event listener callback.
///
/// Runs synchronously on the frame-delivery path; hand long work off to a
/// task.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    by_key: FxHashMap<String, Vec<(ListenerId, Listener)>>,
    keys: FxHashMap<ListenerId, String>,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Event key → listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    registry: RwLock<Registry>,
}

impl ListenerRegistry {
    pub(crate) fn register(&self, key: String, listener: Listener) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        let mut registry = self.registry.write();
        registry.keys.insert(id, key.clone());
        registry.by_key.entry(key).or_default().push((id, listener));

        id
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write();
        let Some(key) = registry.keys.remove(&id) else {
            return false;
        };

        if let Some(listeners) = registry.by_key.get_mut(&key) {
            listeners.retain(|(listener_id, _)| *listener_id != id);
            if listeners.is_empty() {
                registry.by_key.remove(&key);
            }
        }
        true
    }

    /// Copies the listeners for `key` so they can run without the lock.
    pub(crate) fn snapshot(&self, key: &str) -> Vec<(ListenerId, Listener)> {
        self.registry
            .read()
            .by_key
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut registry = self.registry.write();
        let count = registry.keys.len();
        registry.by_key.clear();
        registry.keys.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.read().keys.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
