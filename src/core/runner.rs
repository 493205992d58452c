//! # Run one dispatched item through its handler.
//!
//! Executes the handler for a single [`WorkItem`] with an optional timeout,
//! catches panics, and publishes the item's terminal events to [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   handler.handle() → Ok(()) → publish HandlerCompleted
//!
//! Cancellation:
//!   handler.handle() → Err(Canceled) → publish HandlerCompleted (graceful exit)
//!
//! Failure:
//!   handler.handle() → Err(Fail) → publish HandlerFailed
//!   handler.handle() → panic     → publish HandlerFailed (Panicked)
//!
//! Timeout:
//!   timeout exceeded → cancel token → publish HandlerTimedOut
//!                                   → publish HandlerFailed (timeout)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `HandlerCompleted` or `HandlerFailed`
//! - A panic never unwinds past this function
//! - The token passed in is already a child of the executor root token

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::Handler;
use crate::queue::WorkItem;

/// Runs `handler` on `item`, publishing the outcome to `bus`.
///
/// ### Timeout behavior
/// If `timeout` is `Some(dur)`, the handler future is raced against `dur`.
/// On expiry the token is cancelled, the future is dropped and
/// `HandlerError::Timeout` is returned.
///
/// ### Event semantics
/// - `HandlerCompleted` on `Ok(())` or `Err(Canceled)`
/// - `HandlerFailed` on `Err(Fail | Panicked | Timeout)`
pub async fn run_handler<P, I>(
    handler: &dyn Handler<P, I>,
    item: WorkItem<P, I>,
    ctx: CancellationToken,
    timeout: Option<Duration>,
    bus: &Bus,
) -> Result<(), HandlerError>
where
    P: Send + 'static,
    I: Send + 'static,
{
    let id = item.id();
    let fut = AssertUnwindSafe(async { handler.handle(item, ctx.clone()).await })
        .catch_unwind()
        .map(|caught| {
            caught.unwrap_or_else(|panic| {
                Err(HandlerError::Panicked {
                    info: panic_message(panic),
                })
            })
        });

    let res = match timeout {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                ctx.cancel();
                bus.publish(
                    Event::new(EventKind::HandlerTimedOut)
                        .with_item(id)
                        .with_source(handler.name())
                        .with_timeout(dur),
                );
                Err(HandlerError::Timeout { timeout: dur })
            }
        },
        None => fut.await,
    };

    match res {
        Ok(()) | Err(HandlerError::Canceled) => {
            bus.publish(
                Event::new(EventKind::HandlerCompleted)
                    .with_item(id)
                    .with_source(handler.name()),
            );
        }
        Err(ref e) => {
            bus.publish(
                Event::new(EventKind::HandlerFailed)
                    .with_item(id)
                    .with_source(handler.name())
                    .with_reason(e.as_message()),
            );
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandlerFn;
    use std::sync::Arc;

    async fn next_kind(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Event {
        time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no event")
            .unwrap()
    }

    #[tokio::test]
    async fn test_ok_publishes_completed() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let h: Arc<dyn Handler<(), ()>> = HandlerFn::arc("ok", |_item: WorkItem<(), ()>, _ctx: CancellationToken| async {
            Ok::<_, HandlerError>(())
        });
        let item = WorkItem::new((), ());
        let id = item.id();

        let res = run_handler(h.as_ref(), item, CancellationToken::new(), None, &bus).await;
        assert!(res.is_ok());

        let ev = next_kind(&mut rx).await;
        assert_eq!(ev.kind, EventKind::HandlerCompleted);
        assert_eq!(ev.item, Some(id));
        assert_eq!(ev.source.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_reported() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let h: Arc<dyn Handler<(), ()>> = HandlerFn::arc("boom", |_item: WorkItem<(), ()>, _ctx: CancellationToken| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, HandlerError>(())
        });

        let res = run_handler(h.as_ref(), WorkItem::new((), ()), CancellationToken::new(), None, &bus).await;
        assert!(matches!(res, Err(HandlerError::Panicked { ref info }) if info == "kaboom"));

        let ev = next_kind(&mut rx).await;
        assert_eq!(ev.kind, EventKind::HandlerFailed);
        assert_eq!(ev.reason.as_deref(), Some("panic: kaboom"));
    }

    #[tokio::test]
    async fn test_canceled_counts_as_completed() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let h: Arc<dyn Handler<(), ()>> = HandlerFn::arc("polite", |_item: WorkItem<(), ()>, _ctx: CancellationToken| async {
            Err::<(), _>(HandlerError::Canceled)
        });

        let res = run_handler(h.as_ref(), WorkItem::new((), ()), CancellationToken::new(), None, &bus).await;
        assert!(matches!(res, Err(HandlerError::Canceled)));
        assert_eq!(next_kind(&mut rx).await.kind, EventKind::HandlerCompleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token_and_fails() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let h: Arc<dyn Handler<(), ()>> = HandlerFn::arc("slow", |_item: WorkItem<(), ()>, _ctx: CancellationToken| async {
            time::sleep(Duration::from_secs(60)).await;
            Ok::<_, HandlerError>(())
        });
        let ctx = CancellationToken::new();

        let res = run_handler(
            h.as_ref(),
            WorkItem::new((), ()),
            ctx.clone(),
            Some(Duration::from_millis(200)),
            &bus,
        )
        .await;

        assert!(matches!(res, Err(HandlerError::Timeout { .. })));
        assert!(ctx.is_cancelled());
        let timed_out = next_kind(&mut rx).await;
        assert_eq!(timed_out.kind, EventKind::HandlerTimedOut);
        assert_eq!(timed_out.timeout_ms, Some(200));
        assert_eq!(next_kind(&mut rx).await.kind, EventKind::HandlerFailed);
    }
}
