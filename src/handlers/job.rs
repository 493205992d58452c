//! # Background jobs: closures as work items.
//!
//! Sometimes the producer already knows exactly what to run later (send a
//! proactive message after a delay, flush a cache, ...). [`BackgroundJob`] boxes
//! such a closure so it can travel through the queue as a payload, and
//! [`JobRunner`] is the handler that simply invokes it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use workhost::{BackgroundJob, ExecutorBuilder, ExecutorConfig, HandlerRef, JobRunner};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner: HandlerRef<BackgroundJob, ()> = Arc::new(JobRunner);
//! let exec = ExecutorBuilder::new(ExecutorConfig::default(), runner).build();
//! exec.start()?;
//!
//! let (done_tx, done_rx) = tokio::sync::oneshot::channel();
//! exec.enqueue((), BackgroundJob::new(move |_ctx| async move {
//!     let _ = done_tx.send("flushed");
//!     Ok::<_, workhost::HandlerError>(())
//! }))?;
//!
//! assert_eq!(done_rx.await?, "flushed");
//! exec.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::handler::{BoxHandlerFuture, Handler};
use crate::queue::WorkItem;

type JobFn = Box<dyn FnOnce(CancellationToken) -> BoxHandlerFuture + Send + 'static>;

/// A one-shot closure queued for background execution.
pub struct BackgroundJob {
    run: JobFn,
}

impl BackgroundJob {
    /// Wraps `f`; it is called once, with the handler's cancellation token.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// Consumes the job and returns its future.
    pub fn run(self, ctx: CancellationToken) -> BoxHandlerFuture {
        (self.run)(ctx)
    }
}

impl fmt::Debug for BackgroundJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackgroundJob")
    }
}

/// Handler that runs [`BackgroundJob`] payloads, ignoring the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobRunner;

impl<I: Send + 'static> Handler<BackgroundJob, I> for JobRunner {
    fn name(&self) -> &str {
        "jobs"
    }

    fn handle(&self, item: WorkItem<BackgroundJob, I>, ctx: CancellationToken) -> BoxHandlerFuture {
        let (_identity, job) = item.into_parts();
        job.run(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_receives_token_and_result() {
        let job = BackgroundJob::new(|ctx: CancellationToken| async move {
            if ctx.is_cancelled() {
                return Err(HandlerError::Canceled);
            }
            Err(HandlerError::fail("nope"))
        });

        let item = WorkItem::new("ops", job);
        let res = JobRunner.handle(item, CancellationToken::new()).await;
        assert!(matches!(res, Err(HandlerError::Fail { .. })));
    }

    #[tokio::test]
    async fn test_job_sees_cancelled_token() {
        let job = BackgroundJob::new(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(HandlerError::Canceled)
        });
        let token = CancellationToken::new();
        token.cancel();
        let res = Handler::<BackgroundJob, ()>::handle(&JobRunner, WorkItem::new((), job), token).await;
        assert!(matches!(res, Err(HandlerError::Canceled)));
    }
}
