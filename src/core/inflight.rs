//! # In-flight set: which items have a handler running right now.
//!
//! [`InFlightSet`] is owned by the executor and mutated from two sides:
//! - the consumer loop inserts via [`InFlightSet::register`] **before** spawning the handler;
//! - the returned [`InFlightGuard`] is moved into the handler task and removes the
//!   entry when dropped, i.e. after the handler completes, fails, panics or is aborted.
//!
//! ```text
//! consumer loop:  register(id) ─► guard ─► tokio::spawn(async move { run(..).await; drop(guard) })
//!                                                                              │
//! stop():         wait_empty() ◄── watch<len> ◄───────────── remove(id) ◄──────┘
//! ```
//!
//! ## Rules
//! - Insert-before-spawn: a handler can never finish before its entry exists.
//! - Removal happens exactly once per entry (guard drop).
//! - The watch channel always carries the current size, so `wait_empty`
//!   observes emptiness even if it starts waiting after the last removal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::Instant;

use crate::queue::ItemId;

/// Concurrent map of running handlers, keyed by item id.
pub struct InFlightSet {
    entries: Mutex<HashMap<ItemId, Instant>>,
    size: watch::Sender<usize>,
}

impl InFlightSet {
    /// Creates an empty set.
    pub fn new() -> Arc<Self> {
        let (size, _rx) = watch::channel(0);
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            size,
        })
    }

    /// Inserts `id` and returns the guard that removes it on drop.
    pub fn register(self: &Arc<Self>, id: ItemId) -> InFlightGuard {
        let mut entries = self.lock();
        entries.insert(id, Instant::now());
        self.size.send_replace(entries.len());
        drop(entries);

        InFlightGuard {
            set: Arc::clone(self),
            id,
        }
    }

    /// Number of running handlers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Sorted ids of running handlers, oldest item first.
    pub fn snapshot(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolves once the set is empty.
    pub async fn wait_empty(&self) {
        let mut rx = self.size.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn remove(&self, id: ItemId) {
        let mut entries = self.lock();
        if entries.remove(&id).is_some() {
            self.size.send_replace(entries.len());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ItemId, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Membership token of one dispatched item; dropping it removes the entry.
pub struct InFlightGuard {
    set: Arc<InFlightSet>,
    id: ItemId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkItem;
    use std::time::Duration;

    fn id() -> ItemId {
        WorkItem::new((), ()).id()
    }

    #[test]
    fn test_guard_drop_removes_entry() {
        let set = InFlightSet::new();
        let (a, b) = (id(), id());
        let ga = set.register(a);
        let gb = set.register(b);
        assert_eq!(set.len(), 2);
        assert_eq!(set.snapshot(), vec![a, b]);

        drop(ga);
        assert_eq!(set.snapshot(), vec![b]);
        drop(gb);
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn test_wait_empty_returns_immediately_when_empty() {
        let set = InFlightSet::new();
        tokio::time::timeout(Duration::from_millis(50), set.wait_empty())
            .await
            .expect("empty set should not block");
    }

    #[tokio::test]
    async fn test_wait_empty_resolves_after_last_guard() {
        let set = InFlightSet::new();
        let guards = vec![set.register(id()), set.register(id())];

        let waiter = {
            let set = Arc::clone(&set);
            tokio::spawn(async move { set.wait_empty().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guards);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter stuck")
            .unwrap();
    }

    #[tokio::test]
    async fn test_guard_released_when_task_panics() {
        let set = InFlightSet::new();
        let guard = set.register(id());
        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("handler exploded");
        });
        assert!(task.await.is_err());
        assert_eq!(set.len(), 0);
    }
}
