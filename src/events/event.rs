//! # Runtime events emitted by the executor and its dispatched handlers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Executor lifecycle**: started, shutdown requested, gate closed, drained, stopped
//! - **Item events**: dispatched, completed, failed, timed out, rejected
//! - **Shutdown outcomes**: gate close timeout, drain timeout
//! - **Subscriber events**: overflow and panic of event subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, item id,
//! reasons and timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use workhost::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DrainTimedOut)
//!     .with_reason("2 handlers still running")
//!     .with_in_flight(2)
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::DrainTimedOut);
//! assert_eq!(ev.in_flight, Some(2));
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::queue::ItemId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Executor lifecycle ===
    /// Consumer loop started.
    ///
    /// Sets:
    /// - `source`: handler name
    ExecutorStarted,

    /// `stop()` was called; the executor entered draining.
    ///
    /// Sets:
    /// - `timeout_ms`: shutdown timeout in effect
    /// - `in_flight`: handlers running at that moment
    ShutdownRequested,

    /// Admission gate closed; no further dispatch can begin.
    ///
    /// Sets:
    /// - `in_flight`: handlers left to drain
    GateClosed,

    /// Gate could not be closed before the deadline (best-effort stop follows).
    ///
    /// Sets:
    /// - `timeout_ms`: shutdown timeout in effect
    GateCloseTimedOut,

    /// Every in-flight handler finished before the deadline.
    DrainedWithin,

    /// Deadline passed with handlers still running.
    ///
    /// Sets:
    /// - `timeout_ms`: shutdown timeout in effect
    /// - `in_flight`: number of stuck handlers
    /// - `reason`: stuck item ids
    DrainTimedOut,

    /// Consumer loop exited; the executor is stopped.
    ExecutorStopped,

    // === Item events ===
    /// Item admitted and its handler spawned.
    ///
    /// Sets:
    /// - `item`: item id
    /// - `in_flight`: in-flight count including this item
    ItemDispatched,

    /// Handler finished (successfully or by honoring cancellation).
    ///
    /// Sets:
    /// - `item`: item id
    HandlerCompleted,

    /// Handler returned an error or panicked.
    ///
    /// Sets:
    /// - `item`: item id
    /// - `reason`: error message
    HandlerFailed,

    /// Handler exceeded the per-item timeout (always followed by `HandlerFailed`).
    ///
    /// Sets:
    /// - `item`: item id
    /// - `timeout_ms`: configured handler timeout
    HandlerTimedOut,

    /// Item was dequeued but not admitted because shutdown had begun; it is not executed.
    ///
    /// Sets:
    /// - `item`: item id
    /// - `reason`: "shutting_down" (gate wait expired) or "stopped" (loop cancelled while waiting)
    /// - `timeout_ms`: gate acquire timeout
    DispatchRejected,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Item this event is about, if any.
    pub item: Option<ItemId>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// In-flight handler count at the time of the event.
    pub in_flight: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Emitting component (handler or subscriber name), if applicable.
    pub source: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            item: None,
            timeout_ms: None,
            in_flight: None,
            reason: None,
            source: None,
        }
    }

    /// Attaches an item id.
    #[inline]
    pub fn with_item(mut self, id: ItemId) -> Self {
        self.item = Some(id);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the emitting component name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches the in-flight count.
    #[inline]
    pub fn with_in_flight(mut self, n: usize) -> Self {
        self.in_flight = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkItem;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::ExecutorStarted);
        let b = Event::new(EventKind::ExecutorStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_fill_fields() {
        let item = WorkItem::new((), ());
        let ev = Event::new(EventKind::DispatchRejected)
            .with_item(item.id())
            .with_reason("shutting_down")
            .with_timeout(Duration::from_millis(500));
        assert_eq!(ev.item, Some(item.id()));
        assert_eq!(ev.reason.as_deref(), Some("shutting_down"));
        assert_eq!(ev.timeout_ms, Some(500));
        assert!(ev.source.is_none());
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::GateCloseTimedOut).with_timeout(Duration::MAX);
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
