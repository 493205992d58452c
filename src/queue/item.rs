//! # Work item: opaque payload plus the identity it was submitted under.
//!
//! Every item receives an [`ItemId`] at construction from a process-wide counter.
//! The id is what logs, events and drain reports refer to; the payload and
//! identity are never inspected by the runtime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global sequence counter for item ids.
static ITEM_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique, monotonically increasing identifier of a [`WorkItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        Self(ITEM_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of background work.
///
/// Immutable once built: fields are private and only readable. Ownership moves
/// through the queue to exactly one handler invocation.
///
/// ## Example
/// ```rust
/// use workhost::WorkItem;
///
/// let item = WorkItem::new("user-42", "hello");
/// assert_eq!(*item.identity(), "user-42");
/// assert_eq!(*item.payload(), "hello");
///
/// let (identity, payload) = item.into_parts();
/// assert_eq!((identity, payload), ("user-42", "hello"));
/// ```
pub struct WorkItem<P, I> {
    id: ItemId,
    identity: I,
    payload: P,
}

impl<P, I> WorkItem<P, I> {
    /// Creates an item and assigns it the next [`ItemId`].
    pub fn new(identity: I, payload: P) -> Self {
        Self {
            id: ItemId::next(),
            identity,
            payload,
        }
    }

    /// Returns the item id.
    #[inline]
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns the identity context the item was submitted with.
    #[inline]
    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// Returns the payload.
    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Splits the item into `(identity, payload)`.
    pub fn into_parts(self) -> (I, P) {
        (self.identity, self.payload)
    }
}

impl<P, I> fmt::Debug for WorkItem<P, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem").field("id", &self.id).finish_non_exhaustive()
    }
}
