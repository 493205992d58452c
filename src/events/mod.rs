//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the executor, its dispatched
//! handlers and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: consumer loop (`ItemDispatched`, `DispatchRejected`), `runner::run_handler`
//!   (`HandlerCompleted`, `HandlerFailed`, `HandlerTimedOut`), `stop()` (shutdown events),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the executor's event listener (fans out to `SubscriberSet`) and any
//!   receiver obtained from `BackgroundExecutor::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
