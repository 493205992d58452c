//! # Unbounded FIFO with a counting signal and cancelable dequeue.
//!
//! [`WorkQueue`] pairs a `VecDeque` with a [`tokio::sync::Semaphore`] used as a
//! counting signal: every `enqueue` pushes one item and then adds one permit,
//! every `dequeue` takes one permit (forgetting it) and then pops one item.
//!
//! ## Architecture
//! ```text
//! producers (many)                       consumer(s)
//!   enqueue ──► [push_back] ──► +1 permit ───► acquire ──► forget ──► [pop_front]
//!                                               ▲
//!                         token.cancelled() ────┘ (select; nothing removed)
//! ```
//!
//! ## Rules
//! - **Signals are never lost**: a permit added with nobody waiting stays
//!   available for the next `dequeue`.
//! - **Permits never exceed items**: the push happens before the permit is
//!   added and the pop after it is taken, so a holder of a permit always finds an item.
//! - **Exactly-once delivery**: each permit is consumed by one caller and each
//!   pop removes one item, with any number of concurrent consumers.
//! - **No caller-visible critical sections**: the deque lock is held only for one push/pop
//!   (plus its permit on the enqueue side).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// Thread-safe, unbounded FIFO queue with blocking, cancelable consumption.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use workhost::WorkQueue;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = WorkQueue::new();
/// queue.enqueue(1).unwrap();
/// queue.enqueue(2).unwrap();
///
/// let token = CancellationToken::new();
/// assert_eq!(queue.dequeue(&token).await, Ok(1));
/// assert_eq!(queue.dequeue(&token).await, Ok(2));
/// # }
/// ```
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    signal: Semaphore,
    closed: AtomicBool,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            signal: Semaphore::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends `item` at the tail and signals one consumer.
    ///
    /// Never blocks. Fails with [`QueueError::Closed`] after [`close`](Self::close).
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut items = self.lock();
        if self.closed.load(AtomicOrdering::Acquire) {
            return Err(QueueError::Closed);
        }
        items.push_back(item);
        self.signal.add_permits(1);
        Ok(())
    }

    /// Waits for the head item, or for `token` to be cancelled.
    ///
    /// ### Cancellation semantics
    /// - Cancellation is checked first, so an already-cancelled token never removes an item.
    /// - On cancellation the pending permit wait is dropped; the queue is left unchanged.
    pub async fn dequeue(&self, token: &CancellationToken) -> Result<T, QueueError> {
        loop {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(QueueError::Cancelled),
                permit = self.signal.acquire() => permit.map_err(|_| QueueError::Closed)?,
            };
            permit.forget();

            // A permit is only ever added after its push, so this pop succeeds.
            if let Some(item) = self.lock().pop_front() {
                return Ok(item);
            }
        }
    }

    /// Takes the head item if one is signalled, without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        let permit = self.signal.try_acquire().ok()?;
        permit.forget();
        self.lock().pop_front()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stops accepting new items. Already queued items stay dequeuable.
    ///
    /// Once this returns, every accepted item is signalled, so `try_dequeue`
    /// can empty the queue.
    pub fn close(&self) {
        let _items = self.lock();
        self.closed.store(true, AtomicOrdering::Release);
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order_single_consumer() {
        let queue = WorkQueue::new();
        for i in 0..100 {
            queue.enqueue(i).unwrap();
        }
        let token = CancellationToken::new();
        for expected in 0..100 {
            assert_eq!(queue.dequeue(&token).await, Ok(expected));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_signal_buffered_before_consumer_arrives() {
        let queue = WorkQueue::new();
        queue.enqueue("early").unwrap();
        assert_eq!(queue.len(), 1);
        let token = CancellationToken::new();
        assert_eq!(queue.dequeue(&token).await, Ok("early"));
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(WorkQueue::new());
        let token = CancellationToken::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let token = token.clone();
            tokio::spawn(async move { queue.dequeue(&token).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(7).unwrap();
        assert_eq!(consumer.await.unwrap(), Ok(7));
    }

    #[tokio::test]
    async fn test_cancel_on_empty_queue_leaves_state_unchanged() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());
        let token = CancellationToken::new();

        let consumer = {
            let queue = Arc::clone(&queue);
            let token = token.clone();
            tokio::spawn(async move { queue.dequeue(&token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        assert_eq!(consumer.await.unwrap(), Err(QueueError::Cancelled));
        assert_eq!(queue.len(), 0);

        // The signal count is intact: the next item goes to the next consumer.
        queue.enqueue(1).unwrap();
        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[tokio::test]
    async fn test_cancelled_token_does_not_remove_available_item() {
        let queue = WorkQueue::new();
        queue.enqueue(5).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(queue.dequeue(&token).await, Err(QueueError::Cancelled));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_enqueue_but_drains() {
        let queue = WorkQueue::new();
        queue.enqueue(1).unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(2), Err(QueueError::Closed));
        assert_eq!(queue.try_dequeue(), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_loss_no_duplication_many_producers_consumers() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 250;
        const CONSUMERS: usize = 3;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let queue = Arc::new(WorkQueue::new());
        let token = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let token = token.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Ok(v) = queue.dequeue(&token).await {
                        let _ = tx.send(v);
                    }
                })
            })
            .collect();
        drop(tx);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for i in 0..PER_PRODUCER {
                        queue.enqueue(p * PER_PRODUCER + i).unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for p in producers {
            p.await.unwrap();
        }

        let mut seen = vec![false; TOTAL];
        for _ in 0..TOTAL {
            let v = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("consumers stalled")
                .expect("channel closed early");
            assert!(!seen[v], "item {v} delivered twice");
            seen[v] = true;
        }
        assert!(seen.iter().all(|s| *s));

        token.cancel();
        for c in consumers {
            c.await.unwrap();
        }
        assert!(queue.is_empty());
    }
}
