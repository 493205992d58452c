//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(WorkItem<P, I>, CancellationToken) -> Fut`,
//! producing a fresh future per item. Shared state between invocations must be
//! captured explicitly (e.g. an `Arc<...>` cloned inside the closure).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use workhost::{HandlerError, HandlerFn, HandlerRef, WorkItem};
//!
//! let h: HandlerRef<u32, ()> = HandlerFn::arc("double", |item: WorkItem<u32, ()>, _ctx: CancellationToken| async move {
//!     let _ = item.payload() * 2;
//!     Ok::<_, HandlerError>(())
//! });
//!
//! assert_eq!(h.name(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::handler::{BoxHandlerFuture, Handler};
use crate::queue::WorkItem;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the handler and returns it behind an `Arc`, ready to coerce into a
    /// [`HandlerRef`](crate::HandlerRef).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<P, I, F, Fut> Handler<P, I> for HandlerFn<F>
where
    P: Send + 'static,
    I: Send + 'static,
    F: Fn(WorkItem<P, I>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, item: WorkItem<P, I>, ctx: CancellationToken) -> BoxHandlerFuture {
        Box::pin((self.f)(item, ctx))
    }
}
