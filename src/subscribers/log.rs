//! # LogWriter: events to `tracing`
//!
//! Subscriber that turns each [`Event`] into one `tracing` record. The host
//! process decides where records go by installing a `tracing` subscriber.
//!
//! ## Levels
//! - `error`: `DispatchRejected`, `HandlerFailed`, `SubscriberPanicked`
//! - `warn`: `HandlerTimedOut`, `GateCloseTimedOut`, `DrainTimedOut`, `SubscriberOverflow`
//! - `info`: executor lifecycle (started, shutdown requested, gate closed, drained, stopped)
//! - `debug`: per-item `ItemDispatched`, `HandlerCompleted`

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let item = e.item.map(|id| id.get());
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::DispatchRejected => {
                error!(item, reason, gate_timeout_ms = e.timeout_ms, "work item not processed, executor is shutting down");
            }
            EventKind::HandlerFailed => {
                error!(item, reason, "error occurred executing work item");
            }
            EventKind::HandlerTimedOut => {
                warn!(item, timeout_ms = e.timeout_ms, "work item handler timed out");
            }
            EventKind::ItemDispatched => {
                debug!(item, in_flight = e.in_flight, "work item dispatched");
            }
            EventKind::HandlerCompleted => {
                debug!(item, "work item completed");
            }
            EventKind::ExecutorStarted => {
                info!(handler = e.source.as_deref(), "background executor is running");
            }
            EventKind::ShutdownRequested => {
                info!(timeout_ms = e.timeout_ms, in_flight = e.in_flight, "background executor is stopping");
            }
            EventKind::GateClosed => {
                info!(in_flight = e.in_flight, "admission gate closed, draining");
            }
            EventKind::GateCloseTimedOut => {
                warn!(timeout_ms = e.timeout_ms, "admission gate not closed in time, stopping without drain");
            }
            EventKind::DrainedWithin => {
                info!("all in-flight work items finished");
            }
            EventKind::DrainTimedOut => {
                warn!(timeout_ms = e.timeout_ms, in_flight = e.in_flight, stuck = reason, "drain timeout exceeded");
            }
            EventKind::ExecutorStopped => {
                info!("background executor stopped");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = e.source.as_deref(), reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = e.source.as_deref(), reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
