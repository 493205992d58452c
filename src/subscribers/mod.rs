//! # Event subscribers for the workhost runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   consumer loop / handlers / stop() ── publish(Event) ──► Bus ──► event listener
//!                                                                       │
//!                                                              SubscriberSet::emit
//!                                                         ┌─────────┼─────────┐
//!                                                         ▼         ▼         ▼
//!                                                     LogWriter  Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
