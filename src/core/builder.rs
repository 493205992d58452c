use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    config::ExecutorConfig,
    events::{Bus, Event, EventKind},
    handlers::HandlerRef,
    queue::WorkItem,
    subscribers::{Subscribe, SubscriberSet},
};
use super::executor::{BackgroundExecutor, ExecutorParts, RejectHook};

/// Builder for constructing a [`BackgroundExecutor`] with optional features.
pub struct ExecutorBuilder<P, I> {
    cfg: ExecutorConfig,
    handler: HandlerRef<P, I>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    #[cfg_attr(not(feature = "logging"), allow(dead_code))]
    log_writer: bool,
    parent: Option<CancellationToken>,
    on_rejected: Option<RejectHook<P, I>>,
}

impl<P, I> ExecutorBuilder<P, I>
where
    P: Send + 'static,
    I: Send + 'static,
{
    /// Creates a new builder with the given configuration and handler.
    pub fn new(cfg: ExecutorConfig, handler: HandlerRef<P, I>) -> Self {
        Self {
            cfg,
            handler,
            subscribers: Vec::new(),
            log_writer: true,
            parent: None,
            on_rejected: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (dispatch, failures, shutdown progress)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Does not install the built-in [`LogWriter`](crate::LogWriter).
    ///
    /// Without the `logging` feature there is no log writer and this is a no-op.
    pub fn without_log_writer(mut self) -> Self {
        self.log_writer = false;
        self
    }

    /// Ties the executor to an outer cancellation scope.
    ///
    /// The executor's root token becomes a child of `parent`: cancelling it ends
    /// the consumer loop and signals every running handler. `stop()` is still
    /// needed to reach `Stopped`.
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Receives items that were dequeued but refused because shutdown had begun.
    ///
    /// The default drops them (after the `DispatchRejected` event). A hook can
    /// persist them elsewhere; it runs on the consumer loop and should be quick.
    pub fn on_rejected<F>(mut self, hook: F) -> Self
    where
        F: Fn(WorkItem<P, I>) + Send + Sync + 'static,
    {
        self.on_rejected = Some(Arc::new(hook));
        self
    }

    /// Builds the executor in the `Idle` state.
    ///
    /// This consumes the builder and initializes:
    /// - Event bus for broadcasting
    /// - Subscriber workers and the bus listener feeding them
    /// - Root cancellation token (child of the parent, if any)
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> BackgroundExecutor<P, I> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        #[allow(unused_mut)]
        let mut subscribers = self.subscribers;
        #[cfg(feature = "logging")]
        if self.log_writer {
            subscribers.push(Arc::new(crate::subscribers::LogWriter::new()));
        }

        let listener_done = CancellationToken::new();
        if !subscribers.is_empty() {
            let set = SubscriberSet::new(subscribers, bus.clone());
            subscriber_listener(&bus, set, listener_done.clone());
        }

        let root = match self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let on_rejected: RejectHook<P, I> = match self.on_rejected {
            Some(hook) => hook,
            None => Arc::new(drop::<WorkItem<P, I>>),
        };

        BackgroundExecutor::from_parts(ExecutorParts {
            cfg: self.cfg,
            handler: self.handler,
            bus,
            root,
            listener_done,
            on_rejected,
        })
    }
}

/// Forwards bus events to the subscriber set until `done` is cancelled.
///
/// Events already buffered when `done` fires are still delivered. Events skipped
/// because the listener lagged are reported to subscribers as one
/// `SubscriberOverflow` with reason `lagged=N`.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, done: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged behind the bus");
                        set.emit(lagged_event(skipped));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = done.cancelled() => break,
            }
        }
        set.shutdown().await;
    });
}

fn lagged_event(skipped: u64) -> Event {
    Event::new(EventKind::SubscriberOverflow)
        .with_source("listener")
        .with_reason(format!("lagged={skipped}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Collect(Arc<Mutex<Vec<Event>>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.clone());
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    #[tokio::test]
    async fn test_listener_reports_skipped_events() {
        let bus = Bus::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(vec![Arc::new(Collect(Arc::clone(&seen)))], bus.clone());
        subscriber_listener(&bus, set, CancellationToken::new());

        // Current-thread runtime: the listener has not polled yet, so it lags by 6.
        for _ in 0..10 {
            bus.publish(Event::new(EventKind::ItemDispatched));
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().unwrap().len() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener did not forward events");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].kind, EventKind::SubscriberOverflow);
        assert_eq!(seen[0].reason.as_deref(), Some("lagged=6"));
        assert!(seen[1..].iter().all(|e| e.kind == EventKind::ItemDispatched));
    }
}
