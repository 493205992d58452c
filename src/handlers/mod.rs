//! # Handler abstractions.
//!
//! - [`Handler`] - trait for per-item async processors
//! - [`HandlerFn`] - closure-backed handler
//! - [`HandlerRef`] - shared reference to a handler (`Arc<dyn Handler>`)
//! - [`BackgroundJob`], [`JobRunner`] - queue closures and run them as items

mod handler;
mod handler_fn;
mod job;

pub use handler::{BoxHandlerFuture, Handler, HandlerRef};
pub use handler_fn::HandlerFn;
pub use job::{BackgroundJob, JobRunner};
