//! Typed notifications for the presentation side.
//!
//! A [`Signal<Args>`] holds any number of connected slots and invokes each of
//! them, in connection order, when [`Signal::emit`] is called. Slots run on
//! the emitting thread. In appshelf every emission happens inside the
//! presentation sink, so connected slots always observe presentation state
//! from the single sink thread.
//!
//! # Example
//!
//! ```
//! use appshelf_core::Signal;
//!
//! let view_changed = Signal::<usize>::new();
//!
//! let id = view_changed.connect(|rows| {
//!     println!("view now has {} rows", rows);
//! });
//!
//! view_changed.emit(3);
//! view_changed.disconnect(id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// `Signal<Args>` is `Send + Sync`. Slots are cloned out of the connection
/// table before they are invoked, so a slot may connect or disconnect other
/// slots on the same signal without deadlocking.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots on the current thread.
    ///
    /// Returns the number of slots invoked.
    #[tracing::instrument(skip_all, target = "appshelf_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return 0;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in &slots {
            slot(&args);
        }
        slots.len()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Connect a slot that is disconnected when the returned guard is dropped.
    ///
    /// The guard only holds a weak reference, so it never keeps the signal
    /// alive on its own.
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id,
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().len())
            .field("blocked", &self.blocked.load(Ordering::Relaxed))
            .finish()
    }
}

/// Disconnects its slot when dropped.
///
/// Returned by [`Signal::connect_scoped`]; tie it to the lifetime of the
/// view that listens.
///
/// ```
/// use appshelf_core::Signal;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let rows_changed = Arc::new(Signal::<usize>::new());
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let listener = {
///     let seen = seen.clone();
///     rows_changed.connect_scoped(move |rows| seen.lock().push(*rows))
/// };
/// rows_changed.emit(12);
/// drop(listener);
/// rows_changed.emit(3);
///
/// assert_eq!(*seen.lock(), vec![12]);
/// ```
pub struct ConnectionGuard<Args: 'static> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args: 'static> ConnectionGuard<Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: 'static> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.disconnect(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |value: &T| sink.lock().push(value.clone()))
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let row_updated = Signal::<String>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let log = log.clone();
            row_updated.connect(move |key: &String| log.lock().push(format!("{tag}:{key}")));
        }

        assert_eq!(row_updated.emit("a.app".to_string()), 2);
        assert_eq!(*log.lock(), vec!["first:a.app", "second:a.app"]);
    }

    #[test]
    fn test_disconnected_slot_stops_receiving() {
        let rows = Signal::<usize>::new();
        let (log, slot) = recorder::<usize>();
        let id = rows.connect(slot);

        rows.emit(4);
        assert!(rows.disconnect(id));
        assert!(!rows.disconnect(id));
        rows.emit(5);

        assert_eq!(*log.lock(), vec![4]);
    }

    #[test]
    fn test_blocked_signal_skips_slots() {
        let rows = Signal::<usize>::new();
        let (log, slot) = recorder::<usize>();
        rows.connect(slot);

        rows.set_blocked(true);
        assert!(rows.is_blocked());
        assert_eq!(rows.emit(1), 0);
        rows.set_blocked(false);
        rows.emit(2);

        assert_eq!(*log.lock(), vec![2]);
    }

    #[test]
    fn test_disconnect_all_clears_table() {
        let loaded = Signal::<()>::new();
        for _ in 0..3 {
            loaded.connect(|_| {});
        }
        assert_eq!(loaded.connection_count(), 3);

        loaded.disconnect_all();
        assert_eq!(loaded.connection_count(), 0);
        assert_eq!(loaded.emit(()), 0);
    }

    #[test]
    fn test_slot_may_disconnect_itself() {
        let loaded = Arc::new(Signal::<()>::new());
        let own_id = Arc::new(Mutex::new(None::<ConnectionId>));

        let weak = Arc::downgrade(&loaded);
        let slot_id = own_id.clone();
        let id = loaded.connect(move |_| {
            if let (Some(signal), Some(id)) = (weak.upgrade(), *slot_id.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        assert_eq!(loaded.emit(()), 1);
        assert_eq!(loaded.connection_count(), 0);
    }

    #[test]
    fn test_guard_disconnects_on_drop() {
        let rows = Arc::new(Signal::<usize>::new());
        let (log, slot) = recorder::<usize>();

        let guard = rows.connect_scoped(slot);
        assert_eq!(rows.connection_count(), 1);
        rows.emit(7);
        let id = guard.id();
        drop(guard);

        assert!(!rows.disconnect(id));
        rows.emit(8);
        assert_eq!(*log.lock(), vec![7]);
    }
}
