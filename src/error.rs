//! Error types used by the workhost runtime, its queue and handlers.
//!
//! This module defines four enums:
//!
//! - [`QueueError`] errors returned by [`WorkQueue`](crate::WorkQueue) operations.
//! - [`HandlerError`] errors raised by individual handler executions.
//! - [`ExecutorError`] errors raised by the executor lifecycle itself.
//! - [`ConfigError`] errors raised while loading [`ExecutorConfig`](crate::ExecutorConfig).
//!
//! Runtime-facing types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::queue::ItemId;

/// # Errors produced by the work queue.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The wait was interrupted by its cancellation token; nothing was removed.
    #[error("dequeue cancelled")]
    Cancelled,

    /// The queue no longer accepts items (its executor has stopped).
    #[error("queue closed")]
    Closed,
}

/// # Errors produced by handler execution.
///
/// A handler failure is contained at the dispatch boundary: it is published as
/// `HandlerFailed` and never reaches the consumer loop or sibling handlers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler exceeded the configured per-item timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Handler returned an error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked; the panic was caught at the dispatch boundary.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Handler observed cancellation and exited early.
    #[error("context cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`] from anything printable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workhost::HandlerError;
    /// use std::time::Duration;
    ///
    /// let err = HandlerError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "handler_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Panicked { info } => format!("panic: {info}"),
            HandlerError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// # Errors produced by the executor lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Operation is not valid in the executor's current state
    /// (second `start`, `stop` before `start`, second `stop`).
    #[error("cannot {op} executor in state {state}")]
    InvalidState {
        /// The rejected operation.
        op: &'static str,
        /// State observed when the operation was attempted.
        state: &'static str,
    },

    /// The admission gate could not be closed in time; the executor stopped
    /// without waiting for in-flight handlers.
    #[error("admission gate not closed within {timeout:?}; stopped without drain")]
    GateTimeout {
        /// The shutdown timeout in effect.
        timeout: Duration,
    },

    /// In-flight handlers did not finish before the shutdown deadline.
    #[error("drain timeout {timeout:?} exceeded; stuck: {stuck:?}")]
    DrainTimeout {
        /// The shutdown timeout in effect.
        timeout: Duration,
        /// Items whose handlers were still running.
        stuck: Vec<ItemId>,
    },

    /// Registering OS signal listeners failed.
    #[error("signal listener failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workhost::ExecutorError;
    /// use std::time::Duration;
    ///
    /// let err = ExecutorError::DrainTimeout { timeout: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "executor_drain_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::InvalidState { .. } => "executor_invalid_state",
            ExecutorError::GateTimeout { .. } => "executor_gate_timeout",
            ExecutorError::DrainTimeout { .. } => "executor_drain_timeout",
            ExecutorError::Signal(_) => "executor_signal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ExecutorError::InvalidState { op, state } => format!("{op} rejected in state {state}"),
            ExecutorError::GateTimeout { timeout } => {
                format!("gate still held by dispatch after {timeout:?}")
            }
            ExecutorError::DrainTimeout { timeout, stuck } => {
                format!("drain exceeded {timeout:?}; stuck items={stuck:?}")
            }
            ExecutorError::Signal(e) => format!("signal: {e}"),
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
    },
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_labels() {
        assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
        assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
        assert_eq!(
            HandlerError::Panicked { info: "x".into() }.as_label(),
            "handler_panicked"
        );
    }

    #[test]
    fn test_handler_fail_keeps_message() {
        let err = HandlerError::fail("connection refused");
        assert_eq!(err.to_string(), "execution failed: connection refused");
        assert_eq!(err.as_message(), "error: connection refused");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = ExecutorError::InvalidState {
            op: "start",
            state: "running",
        };
        assert_eq!(err.to_string(), "cannot start executor in state running");
        assert_eq!(err.as_label(), "executor_invalid_state");
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }
}
