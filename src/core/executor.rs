//! # BackgroundExecutor: consumer loop, admission gate and drain-then-stop shutdown.
//!
//! The [`BackgroundExecutor`] owns a [`WorkQueue`], a [`ShutdownGate`] and an
//! [`InFlightSet`]. After [`start`](BackgroundExecutor::start) a single consumer
//! loop dequeues items and launches one handler task per item. Concurrency is
//! not bounded; what is bounded is how long [`stop`](BackgroundExecutor::stop) takes.
//!
//! ## States
//! ```text
//!   Idle ──start()──► Running ──stop()──► Draining ──► Stopped
//! ```
//!
//! ## Consumer loop
//! ```text
//! loop:
//!   queue.dequeue(root) ── Cancelled ──► exit
//!        │
//!        ▼
//!   gate.admit(gate_acquire_timeout)   (raced against root.cancelled())
//!        ├─ admitted ─► in_flight.register(id) ─► spawn run_handler(child token) ─► release gate
//!        └─ refused  ─► publish DispatchRejected ─► on_rejected(item)
//! ```
//!
//! ## Shutdown path
//! ```text
//! stop(timeout):                      deadline = now + timeout
//!   Running → Draining, publish ShutdownRequested
//!   gate.close(until deadline)
//!     ├─ closed  → publish GateClosed
//!     │            in_flight.wait_empty() until deadline
//!     │              ├─ empty    → publish DrainedWithin
//!     │              └─ deadline → publish DrainTimedOut (stuck ids)
//!     └─ timeout → publish GateCloseTimedOut (best-effort stop)
//!   root.cancel()        → loop exits, stragglers see their token cancelled
//!   queue.close()        → leftovers are rejected with reason "stopped"
//!   await loop, Stopped, publish ExecutorStopped
//! ```
//!
//! ## Rules
//! - Once the gate is closed no dispatch can begin; refused items are reported, never silently lost.
//! - Handler errors and panics stay inside their task (see [`run_handler`]).
//! - `start` and `stop` each succeed at most once.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::core::gate::ShutdownGate;
use crate::core::inflight::InFlightSet;
use crate::core::runner::run_handler;
use crate::core::shutdown;
use crate::error::{ExecutorError, QueueError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::queue::{ItemId, WorkItem, WorkQueue};

/// Callback receiving items that were dequeued but not dispatched.
pub type RejectHook<P, I> = Arc<dyn Fn(WorkItem<P, I>) + Send + Sync + 'static>;

const REJECT_SHUTTING_DOWN: &str = "shutting_down";
const REJECT_STOPPED: &str = "stopped";
/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Lifecycle state of a [`BackgroundExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Built, loop not started. Items may already be enqueued.
    Idle,
    /// Consumer loop running, gate open.
    Running,
    /// `stop()` in progress: gate closing or closed, in-flight handlers draining.
    Draining,
    /// Loop exited, queue closed.
    Stopped,
}

impl ExecutorState {
    /// Lowercase name for logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Running => "running",
            ExecutorState::Draining => "draining",
            ExecutorState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the builder hands over.
pub(crate) struct ExecutorParts<P, I> {
    pub cfg: ExecutorConfig,
    pub handler: HandlerRef<P, I>,
    pub bus: Bus,
    pub root: CancellationToken,
    pub listener_done: CancellationToken,
    pub on_rejected: RejectHook<P, I>,
}

struct Inner<P, I> {
    cfg: ExecutorConfig,
    handler: HandlerRef<P, I>,
    queue: Arc<WorkQueue<WorkItem<P, I>>>,
    gate: ShutdownGate,
    in_flight: Arc<InFlightSet>,
    bus: Bus,
    root: CancellationToken,
    listener_done: CancellationToken,
    on_rejected: RejectHook<P, I>,
    state: Mutex<ExecutorState>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

/// Hosted background service draining a [`WorkQueue`] into a handler.
///
/// Cheap to clone; all clones drive the same executor.
/// Built with [`ExecutorBuilder`](crate::ExecutorBuilder).
pub struct BackgroundExecutor<P, I> {
    inner: Arc<Inner<P, I>>,
}

impl<P, I> Clone for BackgroundExecutor<P, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, I> BackgroundExecutor<P, I>
where
    P: Send + 'static,
    I: Send + 'static,
{
    pub(crate) fn from_parts(parts: ExecutorParts<P, I>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg: parts.cfg,
                handler: parts.handler,
                queue: Arc::new(WorkQueue::new()),
                gate: ShutdownGate::new(),
                in_flight: InFlightSet::new(),
                bus: parts.bus,
                root: parts.root,
                listener_done: parts.listener_done,
                on_rejected: parts.on_rejected,
                state: Mutex::new(ExecutorState::Idle),
                consumer: Mutex::new(None),
            }),
        }
    }

    /// Starts the consumer loop (`Idle → Running`).
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(&self) -> Result<(), ExecutorError> {
        self.inner
            .transition(ExecutorState::Idle, ExecutorState::Running, "start")?;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.consume());
        *self
            .inner
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        self.inner
            .bus
            .publish(Event::new(EventKind::ExecutorStarted).with_source(self.inner.handler.name()));
        Ok(())
    }

    /// Stops admitting work and drains in-flight handlers, all within `timeout`.
    ///
    /// The executor ends up `Stopped` whatever the outcome. Returns
    /// [`ExecutorError::GateTimeout`] or [`ExecutorError::DrainTimeout`] if the
    /// drain was not clean, and [`ExecutorError::InvalidState`] unless called
    /// exactly once on a running executor.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ExecutorError> {
        let inner = &self.inner;
        inner.transition(ExecutorState::Running, ExecutorState::Draining, "stop")?;

        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        inner.bus.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_timeout(timeout)
                .with_in_flight(inner.in_flight.len()),
        );

        let outcome = inner.drain(deadline, timeout).await;

        inner.root.cancel();
        inner.queue.close();
        let consumer = inner
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = consumer {
            let _ = handle.await;
        }
        while let Some(item) = inner.queue.try_dequeue() {
            inner.reject(item, REJECT_STOPPED);
        }

        inner.set_state(ExecutorState::Stopped);
        inner.bus.publish(Event::new(EventKind::ExecutorStopped));
        inner.listener_done.cancel();
        outcome
    }

    /// [`stop`](Self::stop) with the configured `shutdown_timeout`.
    pub async fn shutdown(&self) -> Result<(), ExecutorError> {
        self.stop(self.inner.cfg.shutdown_timeout).await
    }

    /// Starts, waits for an OS termination signal (or the parent token), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), ExecutorError> {
        self.start()?;

        let signal = tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => res,
            _ = self.inner.root.cancelled() => Ok(()),
        };
        let stopped = self.shutdown().await;
        signal?;
        stopped
    }

    /// Builds a [`WorkItem`] and queues it. Returns the item id.
    pub fn enqueue(&self, identity: I, payload: P) -> Result<ItemId, QueueError> {
        let item = WorkItem::new(identity, payload);
        let id = item.id();
        self.inner.queue.enqueue(item)?;
        Ok(id)
    }

    /// The underlying queue, for producers that build their own items.
    pub fn queue(&self) -> Arc<WorkQueue<WorkItem<P, I>>> {
        Arc::clone(&self.inner.queue)
    }

    /// Number of handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Ids of the items whose handlers are currently running.
    pub fn in_flight_ids(&self) -> Vec<ItemId> {
        self.inner.in_flight.snapshot()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutorState {
        *self.inner.lock_state()
    }

    /// Raw event stream. Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }
}

impl<P, I> Inner<P, I>
where
    P: Send + 'static,
    I: Send + 'static,
{
    async fn consume(self: Arc<Self>) {
        loop {
            let item = match self.queue.dequeue(&self.root).await {
                Ok(item) => item,
                Err(QueueError::Cancelled | QueueError::Closed) => break,
            };
            self.dispatch(item).await;
        }
    }

    async fn dispatch(&self, item: WorkItem<P, I>) {
        let wait = self.cfg.gate_acquire_timeout;
        let admitted = tokio::select! {
            biased;
            _ = self.root.cancelled() => Err(REJECT_STOPPED),
            guard = self.gate.admit(wait) => guard.ok_or(REJECT_SHUTTING_DOWN),
        };
        let _admission = match admitted {
            Ok(guard) => guard,
            Err(reason) => {
                self.reject(item, reason);
                return;
            }
        };

        let id = item.id();
        let entry = self.in_flight.register(id);
        let ctx = self.root.child_token();
        self.bus.publish(
            Event::new(EventKind::ItemDispatched)
                .with_item(id)
                .with_in_flight(self.in_flight.len()),
        );

        let handler = Arc::clone(&self.handler);
        let bus = self.bus.clone();
        let timeout = self.cfg.handler_timeout();
        tokio::spawn(async move {
            let _entry = entry;
            let _ = run_handler(handler.as_ref(), item, ctx, timeout, &bus).await;
        });
    }

    fn reject(&self, item: WorkItem<P, I>, reason: &'static str) {
        let mut ev = Event::new(EventKind::DispatchRejected)
            .with_item(item.id())
            .with_reason(reason);
        // Only refusals at the gate waited on it.
        if reason == REJECT_SHUTTING_DOWN {
            ev = ev.with_timeout(self.cfg.gate_acquire_timeout);
        }
        self.bus.publish(ev);

        let id = item.id();
        let hook = AssertUnwindSafe(|| (self.on_rejected)(item));
        if let Err(panic) = std::panic::catch_unwind(hook) {
            self.bus.publish(
                Event::new(EventKind::HandlerFailed)
                    .with_item(id)
                    .with_source("on_rejected")
                    .with_reason(format!("panic: {}", panic_message(panic))),
            );
        }
    }

    async fn drain(&self, deadline: Instant, timeout: Duration) -> Result<(), ExecutorError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.gate.close(remaining).await {
            self.bus
                .publish(Event::new(EventKind::GateCloseTimedOut).with_timeout(timeout));
            return Err(ExecutorError::GateTimeout { timeout });
        }
        self.bus
            .publish(Event::new(EventKind::GateClosed).with_in_flight(self.in_flight.len()));

        match time::timeout_at(deadline, self.in_flight.wait_empty()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::DrainedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.in_flight.snapshot();
                let listed = stuck
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                self.bus.publish(
                    Event::new(EventKind::DrainTimedOut)
                        .with_timeout(timeout)
                        .with_in_flight(stuck.len())
                        .with_reason(format!("stuck=[{listed}]")),
                );
                Err(ExecutorError::DrainTimeout { timeout, stuck })
            }
        }
    }

    fn transition(
        &self,
        from: ExecutorState,
        to: ExecutorState,
        op: &'static str,
    ) -> Result<(), ExecutorError> {
        let mut state = self.lock_state();
        if *state != from {
            return Err(ExecutorError::InvalidState {
                op,
                state: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: ExecutorState) {
        *self.lock_state() = to;
    }

    fn lock_state(&self) -> MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutorBuilder, HandlerError, HandlerFn};

    fn noop() -> HandlerRef<u32, ()> {
        HandlerFn::arc("noop", |_item: WorkItem<u32, ()>, _ctx: CancellationToken| async {
            Ok::<_, HandlerError>(())
        })
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ExecutorState::Idle.to_string(), "idle");
        assert_eq!(ExecutorState::Draining.as_str(), "draining");
    }

    #[tokio::test]
    async fn test_enqueue_before_start_is_buffered() {
        let exec = ExecutorBuilder::new(ExecutorConfig::default(), noop())
            .without_log_writer()
            .build();
        exec.enqueue((), 7).unwrap();
        assert_eq!(exec.queue().len(), 1);
        assert_eq!(exec.state(), ExecutorState::Idle);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_invalid() {
        let exec = ExecutorBuilder::new(ExecutorConfig::default(), noop())
            .without_log_writer()
            .build();
        let err = exec.stop(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::InvalidState { op: "stop", state: "idle" }
        ));
    }

    #[tokio::test]
    async fn test_stopped_executor_closes_queue() {
        let exec = ExecutorBuilder::new(ExecutorConfig::default(), noop())
            .without_log_writer()
            .build();
        exec.start().unwrap();
        exec.stop(Duration::from_secs(1)).await.unwrap();

        assert_eq!(exec.state(), ExecutorState::Stopped);
        assert_eq!(exec.enqueue((), 1), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_leftovers_rejected_as_stopped_without_gate_timeout() {
        let parent = CancellationToken::new();
        let exec = ExecutorBuilder::new(ExecutorConfig::default(), noop())
            .without_log_writer()
            .with_cancellation(parent.clone())
            .build();
        let mut events = exec.subscribe();
        let a = exec.enqueue((), 1).unwrap();
        let b = exec.enqueue((), 2).unwrap();
        parent.cancel();

        exec.start().unwrap();
        exec.stop(Duration::from_secs(1)).await.unwrap();

        let mut rejected = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::DispatchRejected {
                assert_eq!(ev.reason.as_deref(), Some(REJECT_STOPPED));
                assert_eq!(ev.timeout_ms, None);
                rejected.extend(ev.item);
            }
        }
        assert_eq!(rejected, vec![a, b]);
    }

    #[tokio::test]
    async fn test_gate_timeout_still_stops() {
        let exec = ExecutorBuilder::new(ExecutorConfig::default(), noop())
            .without_log_writer()
            .build();
        let mut events = exec.subscribe();
        exec.start().unwrap();

        let admitted = exec
            .inner
            .gate
            .admit(Duration::from_secs(1))
            .await
            .expect("open gate admits");
        let err = exec.stop(Duration::ZERO).await.unwrap_err();
        drop(admitted);

        assert!(matches!(err, ExecutorError::GateTimeout { .. }));
        assert_eq!(exec.state(), ExecutorState::Stopped);
        assert_eq!(exec.enqueue((), 1), Err(QueueError::Closed));

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::GateCloseTimedOut));
        assert!(!kinds.contains(&EventKind::GateClosed));
        assert_eq!(kinds.last(), Some(&EventKind::ExecutorStopped));
    }
}
