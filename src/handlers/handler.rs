//! # Handler abstraction.
//!
//! A [`Handler`] receives one [`WorkItem`] and a [`CancellationToken`] and
//! returns a boxed future. The executor calls it once per admitted item, each
//! call on its own Tokio task. [`HandlerRef`] is the shared `Arc<dyn Handler>`
//! the runtime stores.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::queue::WorkItem;

/// Boxed future returned by [`Handler::handle`].
pub type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// Shared handle to a handler.
pub type HandlerRef<P, I> = Arc<dyn Handler<P, I>>;

/// # Asynchronous per-item processor.
///
/// The token is cancelled when the executor stops after its drain deadline, or
/// when the per-item timeout expires. Implementations should watch it and
/// return [`HandlerError::Canceled`] (treated as a graceful exit).
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use workhost::{BoxHandlerFuture, Handler, WorkItem};
///
/// struct Echo;
///
/// impl Handler<String, String> for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     fn handle(&self, item: WorkItem<String, String>, _ctx: CancellationToken) -> BoxHandlerFuture {
///         Box::pin(async move {
///             let (user, text) = item.into_parts();
///             println!("{user}: {text}");
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler<P, I>: Send + Sync + 'static {
    /// Returns a stable, human-readable handler name.
    fn name(&self) -> &str;

    /// Creates the future that processes `item`.
    fn handle(&self, item: WorkItem<P, I>, ctx: CancellationToken) -> BoxHandlerFuture;
}
