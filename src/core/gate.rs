//! # Admission gate: readers dispatch, the writer shuts the door.
//!
//! [`ShutdownGate`] wraps a `tokio::sync::RwLock<()>`:
//! - every dispatch takes the **read** side for the short window
//!   "register in-flight → spawn handler" and releases it right after;
//! - `stop()` takes the **write** side once and keeps it until the gate is dropped.
//!
//! ```text
//! Running:   admit() ─► read guard ─► register + spawn ─► drop guard
//! Draining:  close() ─► write guard (held forever)
//!            admit() ─► waits ─► timeout ─► None (item rejected)
//! ```
//!
//! ## Rules
//! - Tokio's `RwLock` is fair and write-preferring: once `close()` is queued,
//!   no new reader is admitted, even before the writer gets the lock.
//! - Read holds are bounded (no await inside the admitted window), so `close()`
//!   completes as soon as the current dispatch, if any, releases.
//! - Both waits are cancel-safe: dropping a timed-out acquire leaves no trace.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};
use tokio::time;

/// Readers-writer admission gate.
pub struct ShutdownGate {
    lock: Arc<RwLock<()>>,
    held: Mutex<Option<OwnedRwLockWriteGuard<()>>>,
}

impl ShutdownGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
            held: Mutex::new(None),
        }
    }

    /// Tries to enter for one dispatch, waiting at most `wait`.
    ///
    /// Returns `None` if the gate is (being) closed and the wait expired.
    pub async fn admit(&self, wait: Duration) -> Option<RwLockReadGuard<'_, ()>> {
        time::timeout(wait, self.lock.read()).await.ok()
    }

    /// Closes the gate, waiting at most `wait` for an admitted dispatch to leave.
    ///
    /// Returns `true` if the gate is closed (now or already).
    pub async fn close(&self, wait: Duration) -> bool {
        if self.is_closed() {
            return true;
        }
        match time::timeout(wait, Arc::clone(&self.lock).write_owned()).await {
            Ok(guard) => {
                *self.held.lock().unwrap_or_else(PoisonError::into_inner) = Some(guard);
                true
            }
            Err(_elapsed) => false,
        }
    }

    /// True once [`close`](Self::close) succeeded.
    pub fn is_closed(&self) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
