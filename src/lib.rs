//! # workhost
//!
//! **Workhost** is an in-process background work queue with a hosted executor.
//!
//! Producers (request handlers, timers, other tasks) enqueue work items and
//! return immediately. A single consumer loop dequeues them and runs a handler
//! for each item on its own Tokio task. Shutdown stops admitting new work and
//! waits, up to a deadline, for the handlers that are already running.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  producer #1 │   │  producer #2 │   │  producer #3 │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │   enqueue(identity, payload) (never blocks)
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WorkQueue (VecDeque + counting Semaphore)                        │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼ dequeue(root token)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  BackgroundExecutor (consumer loop)                               │
//! │  - ShutdownGate (RwLock: read = dispatch, write = shutdown)       │
//! │  - InFlightSet  (ItemId -> start, drop-guard removal)             │
//! │  - Bus          (broadcast events)                                │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ handler task │   │ handler task │   │ handler task │   │
//!     │  (item #1)   │   │  (item #2)   │   │  (item #3)   │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ HandlerCompleted │ HandlerFailed    │ HandlerTimedOut │ ShutdownRequested
//!      ▼                  ▼                  ▼                 ▼ DrainedWithin ...
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │               (capacity: ExecutorConfig::bus_capacity)            │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter  metrics   custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──start()──► Running ──stop(timeout)──► Draining ──► Stopped
//!
//! Running:
//!   dequeue ─► admit (gate read, gate_acquire_timeout)
//!                ├─ ok      ─► register in-flight ─► spawn handler ─► release gate
//!                └─ refused ─► DispatchRejected ─► on_rejected hook (default: drop)
//!
//! Draining (one deadline for all steps):
//!   close gate (write) ─► wait for in-flight set to empty ─► cancel root token
//!   ─► close queue ─► join loop ─► ExecutorStopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Queue**         | Unbounded FIFO with cancelable dequeue.                       | [`WorkQueue`], [`WorkItem`], [`ItemId`]         |
//! | **Executor**      | Consumer loop, admission gate, bounded drain.                 | [`BackgroundExecutor`], [`ExecutorBuilder`]     |
//! | **Handlers**      | Per-item async processors, closures, queued jobs.             | [`Handler`], [`HandlerFn`], [`BackgroundJob`]   |
//! | **Subscriber API**| Hook into executor events (logging, metrics, custom).         | [`Subscribe`], [`Event`], [`EventKind`]         |
//! | **Errors**        | Typed errors for queue, handlers, lifecycle and config.       | [`QueueError`], [`HandlerError`], [`ExecutorError`] |
//! | **Configuration** | Timeouts and bus size, from code or `WORKHOST_*` variables.   | [`ExecutorConfig`]                              |
//!
//! ## Optional features
//! - `logging` (default): the built-in [`LogWriter`] subscriber, installed by the builder unless
//!   [`ExecutorBuilder::without_log_writer`] is called.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use workhost::{ExecutorBuilder, ExecutorConfig, HandlerError, HandlerFn, HandlerRef, WorkItem};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let handler: HandlerRef<String, u64> = HandlerFn::arc(
//!         "greeter",
//!         move |item: WorkItem<String, u64>, _ctx: CancellationToken| {
//!             let seen_tx = seen_tx.clone();
//!             async move {
//!                 let (user, text) = item.into_parts();
//!                 seen_tx.send(format!("{user}: {text}")).map_err(HandlerError::fail)?;
//!                 Ok::<_, HandlerError>(())
//!             }
//!         },
//!     );
//!
//!     let exec = ExecutorBuilder::new(ExecutorConfig::default(), handler).build();
//!     exec.start()?;
//!     exec.enqueue(42, "hello".to_string())?;
//!
//!     assert_eq!(seen_rx.recv().await.as_deref(), Some("42: hello"));
//!     exec.stop(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod handlers;
mod queue;
mod subscribers;

// ---- Public re-exports ----

pub use config::ExecutorConfig;
pub use core::{BackgroundExecutor, ExecutorBuilder, ExecutorState, RejectHook};
pub use error::{ConfigError, ExecutorError, HandlerError, QueueError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{BackgroundJob, BoxHandlerFuture, Handler, HandlerFn, HandlerRef, JobRunner};
pub use queue::{ItemId, WorkItem, WorkQueue};
pub use subscribers::{Subscribe, SubscriberSet};

// Built-in logger subscriber.
// Enabled by default with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
