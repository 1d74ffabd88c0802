//! Message listener registry.
//!
//! Maps a message-type filter to an ordered list of callbacks. Dispatch
//! walks the listeners for the message's concrete type first, then the
//! wildcard listeners, both in registration order.
//!
//! Two guarantees matter here:
//!
//! - Dispatch iterates a snapshot taken when the pass starts, so a callback
//!   that registers or removes listeners cannot skip or duplicate
//!   invocations within the current pass.
//! - A panicking callback is caught and logged; the remaining listeners of
//!   the pass still run.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error};

use crate::protocol::{MessageType, ServerMessage};

// ============================================================================
// Types
// ============================================================================

/// Callback invoked for each matching message.
pub type MessageCallback = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

// ============================================================================
// MessageFilter
// ============================================================================

/// Which messages a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageFilter {
    /// Only messages of one concrete type.
    Kind(MessageType),

    /// Every message, regardless of type (the wildcard).
    Any,
}

impl From<MessageType> for MessageFilter {
    fn from(kind: MessageType) -> Self {
        Self::Kind(kind)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Handle identifying one registration.
///
/// Closures have no usable identity in Rust, so removal goes through the id
/// returned by [`ListenerRegistry::add`] / [`ListenerRegistry::once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// ListenerEntry
// ============================================================================

/// One registered callback.
struct ListenerEntry {
    /// Registration handle.
    id: ListenerId,
    /// The subscriber callback.
    callback: MessageCallback,
    /// One-shot registrations are removed when snapshotted for dispatch.
    once: bool,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Ordered listener lists keyed by [`MessageFilter`].
pub struct ListenerRegistry {
    /// Listener lists; insertion order within a list is dispatch order.
    listeners: Mutex<FxHashMap<MessageFilter, Vec<ListenerEntry>>>,
    /// Source of listener ids.
    next_id: AtomicU64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback for messages matching `filter`.
    ///
    /// Appends to the end of the filter's list; dispatch order is
    /// registration order.
    pub fn add<F>(&self, filter: impl Into<MessageFilter>, callback: F) -> ListenerId
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.insert(filter.into(), Arc::new(callback), false)
    }

    /// Registers a one-shot callback.
    ///
    /// The registration fires for exactly one matching message and is then
    /// absent from the registry, no matter how many further matching
    /// messages arrive.
    pub fn once<F>(&self, filter: impl Into<MessageFilter>, callback: F) -> ListenerId
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.insert(filter.into(), Arc::new(callback), true)
    }

    fn insert(&self, filter: MessageFilter, callback: MessageCallback, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.listeners
            .lock()
            .entry(filter)
            .or_default()
            .push(ListenerEntry { id, callback, once });

        debug!(%id, ?filter, once, "Listener registered");
        id
    }

    /// Removes one registration.
    ///
    /// Returns `true` if a listener with that id was registered under
    /// `filter`.
    pub fn remove(&self, filter: impl Into<MessageFilter>, id: ListenerId) -> bool {
        let filter = filter.into();
        let mut listeners = self.listeners.lock();

        let Some(entries) = listeners.get_mut(&filter) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() < before;

        if entries.is_empty() {
            listeners.remove(&filter);
        }
        removed
    }

    /// Removes all listeners for one filter, or every listener if `None`.
    pub fn clear(&self, filter: Option<MessageFilter>) {
        let mut listeners = self.listeners.lock();
        match filter {
            Some(filter) => {
                listeners.remove(&filter);
            }
            None => listeners.clear(),
        }
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener matching `message`.
    ///
    /// Concrete-type listeners run before wildcard listeners; within each
    /// list the order is registration order. The callback set is snapshotted
    /// up front and one-shot registrations are removed at snapshot time, so
    /// they fire at most once even if a callback re-enters the registry.
    pub fn dispatch(&self, message: &ServerMessage) {
        let callbacks = self.snapshot_for(message.message_type);

        for (id, callback) in callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| callback(message)));
            if let Err(panic) = result {
                let detail = panic_message(panic.as_ref());
                error!(%id, kind = %message.message_type, detail, "Listener panicked");
            }
        }
    }

    /// Snapshots the callbacks for one dispatch pass and retires one-shots.
    fn snapshot_for(&self, kind: MessageType) -> Vec<(ListenerId, MessageCallback)> {
        let mut listeners = self.listeners.lock();
        let mut snapshot = Vec::new();

        for filter in [MessageFilter::Kind(kind), MessageFilter::Any] {
            let Some(entries) = listeners.get_mut(&filter) else {
                continue;
            };

            for entry in entries.iter() {
                snapshot.push((entry.id, Arc::clone(&entry.callback)));
            }

            entries.retain(|entry| !entry.once);
            if entries.is_empty() {
                listeners.remove(&filter);
            }
        }

        snapshot
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    use crate::protocol::MessageType;

    fn msg(kind: MessageType) -> ServerMessage {
        ServerMessage::new(kind, 1)
    }

    #[test]
    fn test_dispatch_order_type_then_wildcard() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for (label, filter) in [
            ("chat-1", MessageFilter::Kind(MessageType::Chat)),
            ("any-1", MessageFilter::Any),
            ("chat-2", MessageFilter::Kind(MessageType::Chat)),
            ("any-2", MessageFilter::Any),
        ] {
            let order = Arc::clone(&order);
            registry.add(filter, move |_| order.lock().unwrap().push(label));
        }

        registry.dispatch(&msg(MessageType::Chat));

        let order = order.lock().unwrap();
        assert_eq!(*order, vec!["chat-1", "chat-2", "any-1", "any-2"]);
    }

    #[test]
    fn test_non_matching_type_not_invoked() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry.add(MessageType::Move, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&msg(MessageType::Chat));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_by_id() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = registry.add(MessageType::Chat, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.remove(MessageType::Chat, id));
        assert!(!registry.remove(MessageType::Chat, id));

        registry.dispatch(&msg(MessageType::Chat));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry.once(MessageType::Match, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            registry.dispatch(&msg(MessageType::Match));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_listener_isolated() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.add(MessageType::Chat, |_| panic!("subscriber bug"));

        let counter = Arc::clone(&hits);
        registry.add(MessageType::Chat, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let counter = Arc::clone(&hits);
        registry.add(MessageFilter::Any, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&msg(MessageType::Chat));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_does_not_skip() {
        let registry = Arc::new(ListenerRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        // First listener removes the second mid-pass; the snapshot still
        // runs the second one for the current message.
        let second_id = Arc::new(StdMutex::new(None::<ListenerId>));

        let reg = Arc::clone(&registry);
        let slot = Arc::clone(&second_id);
        registry.add(MessageType::Chat, move |_| {
            if let Some(id) = *slot.lock().unwrap() {
                reg.remove(MessageType::Chat, id);
            }
        });

        let counter = Arc::clone(&hits);
        let id = registry.add(MessageType::Chat, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *second_id.lock().unwrap() = Some(id);

        registry.dispatch(&msg(MessageType::Chat));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Next pass no longer sees the removed listener.
        registry.dispatch(&msg(MessageType::Chat));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_one_filter() {
        let registry = ListenerRegistry::new();
        registry.add(MessageType::Chat, |_| {});
        registry.add(MessageType::Move, |_| {});
        registry.add(MessageFilter::Any, |_| {});

        registry.clear(Some(MessageFilter::Kind(MessageType::Chat)));
        assert_eq!(registry.len(), 2);

        registry.clear(None);
        assert!(registry.is_empty());
    }
}
