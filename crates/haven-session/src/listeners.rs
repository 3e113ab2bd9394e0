// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-change listener registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use haven_core::Session;

/// A session-change callback. Receives `None` when the user is signed out.
pub(crate) type Callback = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

/// Registered callbacks, invoked in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback)>>,
}

impl ListenerSet {
    fn entries(&self) -> MutexGuard<'_, Vec<(u64, Callback)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(self: &Arc<Self>, callback: Callback) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().push((id, callback));
        ListenerHandle {
            id,
            set: Arc::downgrade(self),
        }
    }

    /// Removes the listener with `id`. Returns false if it was already gone.
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.entries().iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    /// Calls every listener with `session`.
    ///
    /// The registry lock is released before any callback runs, so a callback
    /// may add or remove listeners.
    pub(crate) fn notify(&self, session: Option<&Session>) {
        let callbacks: Vec<Callback> = self.entries().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(session);
        }
    }
}

/// Deregistration handle returned by
/// [`SessionCoordinator::add_listener`](crate::SessionCoordinator::add_listener).
///
/// Dropping the handle removes the listener. Call [`ListenerHandle::remove`]
/// to remove it earlier; removing more than once is harmless.
#[must_use = "dropping the handle removes the listener immediately"]
pub struct ListenerHandle {
    id: u64,
    set: Weak<ListenerSet>,
}

impl ListenerHandle {
    /// Stops future notifications. Idempotent.
    pub fn remove(&self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }

    /// True while the listener is still registered with a live coordinator.
    pub fn is_active(&self) -> bool {
        self.set.upgrade().is_some_and(|set| set.contains(self.id))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn remove_is_idempotent() {
        let set = Arc::new(ListenerSet::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = set.insert(counting(&calls));
        let _other = set.insert(counting(&calls));

        handle.remove();
        handle.remove();
        assert!(!handle.is_active());
        assert_eq!(set.len(), 1);

        set.notify(None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_removes_listener() {
        let set = Arc::new(ListenerSet::default());
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let handle = set.insert(counting(&calls));
            assert!(handle.is_active());
        }
        assert_eq!(set.len(), 0);
        set.notify(None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handle_outliving_registry_is_inert() {
        let set = Arc::new(ListenerSet::default());
        let handle = set.insert(Arc::new(|_| {}));
        drop(set);
        assert!(!handle.is_active());
        handle.remove();
    }

    #[test]
    fn callback_may_deregister_during_notify() {
        let set = Arc::new(ListenerSet::default());
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));
        let slot_in_cb = Arc::clone(&slot);
        let handle = set.insert(Arc::new(move |_| {
            if let Some(h) = slot_in_cb.lock().unwrap().as_ref() {
                h.remove();
            }
        }));
        *slot.lock().unwrap() = Some(handle);

        set.notify(None);
        assert_eq!(set.len(), 0);
    }
}
