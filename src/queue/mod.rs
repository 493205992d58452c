//! # Work items and the queue that carries them.
//!
//! - [`WorkItem`] payload + identity, tagged with an [`ItemId`]
//! - [`WorkQueue`] unbounded FIFO with counting-signal dequeue

mod item;
mod work_queue;

pub use item::{ItemId, WorkItem};
pub use work_queue::WorkQueue;
