//! Runtime core: the hosted executor and its moving parts.
//!
//! The public API from this module is [`BackgroundExecutor`], built by
//! [`ExecutorBuilder`], and its [`ExecutorState`].
//!
//! Internal modules:
//! - [`executor`]: consumer loop, dispatch, drain-then-stop shutdown;
//! - [`builder`]: wires bus, subscribers and cancellation scope;
//! - [`gate`]: readers-writer admission gate;
//! - [`inflight`]: set of running handlers with drop-guard removal;
//! - [`runner`]: runs one item with timeout, panic capture and event publishing;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod executor;
mod gate;
mod inflight;
mod runner;
mod shutdown;

pub use builder::ExecutorBuilder;
pub use executor::{BackgroundExecutor, ExecutorState, RejectHook};
