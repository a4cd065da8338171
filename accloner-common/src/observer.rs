//! Observer list primitives for session event fan-out
//!
//! Provides [`ObserverList`], an ordered registry of callbacks dispatched
//! synchronously at the emission point. Each registration returns a
//! [`SubscriberId`] token so callers can remove exactly the callback they
//! added, even when the same closure body is registered twice.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

/// Identity token for a registered observer callback
///
/// Tokens are allocated from one process-wide counter and never reused, so
/// a token can only ever name the callback it was returned for. Passing a
/// token to the wrong list is a no-op rather than a stray removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slot<E> {
    id: SubscriberId,
    callback: Callback<E>,
}

/// Ordered list of observer callbacks for one event kind
///
/// Callbacks are invoked in registration order. A callback that panics is
/// logged and skipped without affecting later callbacks or the emitter.
///
/// # Examples
///
/// ```
/// use accloner_common::observer::ObserverList;
///
/// let list: ObserverList<u32> = ObserverList::new();
/// let id = list.subscribe(|value| println!("got {}", value));
/// list.emit(&42);
/// assert!(list.unsubscribe(id));
/// assert!(!list.unsubscribe(id));
/// ```
pub struct ObserverList<E> {
    slots: Mutex<Vec<Slot<E>>>,
}

impl<E> ObserverList<E> {
    /// Creates an empty observer list
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback and returns its removal token
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().unwrap().push(Slot {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes the callback registered under `id`
    ///
    /// Returns `true` if the callback was present. Removing an unknown or
    /// already-removed token is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }

    /// Invokes every registered callback with `event`, in registration order
    ///
    /// The list lock is not held during dispatch, so callbacks may register
    /// or remove observers without deadlocking. A panicking callback is
    /// isolated: the panic is logged and remaining callbacks still run.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .slots
            .lock()
            .unwrap()
            .iter()
            .map(|slot| Arc::clone(&slot.callback))
            .collect();

        for callback in snapshot {
            Self::invoke(&callback, event);
        }
    }

    /// Invokes and clears all registered callbacks
    ///
    /// Used for one-shot notification lists where each callback fires at
    /// most once (the ready list).
    pub fn emit_and_drain(&self, event: &E) {
        let snapshot: Vec<Slot<E>> = std::mem::take(&mut *self.slots.lock().unwrap());

        for slot in snapshot {
            Self::invoke(&slot.callback, event);
        }
    }

    /// Number of currently registered callbacks
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Returns `true` when no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invoke(callback: &Callback<E>, event: &E) {
        if let Err(panic_payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic in observer callback".to_string()
            };

            error!("Observer callback panicked: {}", panic_msg);
        }
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}
