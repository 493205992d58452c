//! # Executor configuration.
//!
//! Provides [`ExecutorConfig`] centralized settings for the background executor.
//!
//! ## Sentinel values
//! - `handler_timeout = 0s` → no per-item timeout
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable for [`ExecutorConfig::shutdown_timeout`] (whole seconds).
pub const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "WORKHOST_SHUTDOWN_TIMEOUT_SECS";
/// Environment variable for [`ExecutorConfig::gate_acquire_timeout`] (milliseconds).
pub const ENV_GATE_TIMEOUT_MS: &str = "WORKHOST_GATE_TIMEOUT_MS";
/// Environment variable for [`ExecutorConfig::handler_timeout`] (whole seconds, `0` = none).
pub const ENV_HANDLER_TIMEOUT_SECS: &str = "WORKHOST_HANDLER_TIMEOUT_SECS";
/// Environment variable for [`ExecutorConfig::bus_capacity`].
pub const ENV_BUS_CAPACITY: &str = "WORKHOST_BUS_CAPACITY";

/// Configuration for the background executor.
///
/// ## Field semantics
/// - `shutdown_timeout`: Upper bound for `stop()` (gate close + drain)
/// - `gate_acquire_timeout`: How long a dequeued item waits for admission before it is rejected
/// - `handler_timeout`: Per-item handler timeout (`0s` = no timeout)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Maximum time `stop()` spends closing the gate and waiting for in-flight handlers.
    ///
    /// When the deadline passes, remaining handlers are signalled to cancel
    /// (cooperatively) and `stop()` returns `ExecutorError::DrainTimeout`.
    pub shutdown_timeout: Duration,

    /// Maximum wait for the admission gate per dequeued item.
    ///
    /// During normal operation the gate is free and admission is immediate.
    /// Once shutdown holds the gate, every waiting item is rejected after this long.
    pub gate_acquire_timeout: Duration,

    /// Per-item handler timeout.
    ///
    /// - `Duration::ZERO` = handlers run until they complete
    /// - `> 0` = handler token is cancelled and the future dropped on expiry
    pub handler_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl ExecutorConfig {
    /// Loads configuration from `WORKHOST_*` environment variables.
    ///
    /// Unset variables keep their defaults; set but malformed variables are an error.
    ///
    /// Environment variables:
    /// - `WORKHOST_SHUTDOWN_TIMEOUT_SECS`
    /// - `WORKHOST_GATE_TIMEOUT_MS`
    /// - `WORKHOST_HANDLER_TIMEOUT_SECS`
    /// - `WORKHOST_BUS_CAPACITY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SHUTDOWN_TIMEOUT_SECS)? {
            cfg.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_GATE_TIMEOUT_MS)? {
            cfg.gate_acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_HANDLER_TIMEOUT_SECS)? {
            cfg.handler_timeout = Duration::from_secs(secs);
        }
        if let Some(cap) = parse_var::<usize, _>(&lookup, ENV_BUS_CAPACITY)? {
            cfg.bus_capacity = cap;
        }
        Ok(cfg)
    }

    /// Returns the per-item timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied to every handler invocation
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `shutdown_timeout = 10s`
    /// - `gate_acquire_timeout = 500ms`
    /// - `handler_timeout = 0s` (no timeout)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(10),
            gate_acquire_timeout: Duration::from_millis(500),
            handler_timeout: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = ExecutorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(cfg.gate_acquire_timeout, Duration::from_millis(500));
        assert!(cfg.handler_timeout().is_none());
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let cfg = ExecutorConfig::from_lookup(lookup(&[
            (ENV_SHUTDOWN_TIMEOUT_SECS, "30"),
            (ENV_GATE_TIMEOUT_MS, " 250 "),
            (ENV_HANDLER_TIMEOUT_SECS, "5"),
            (ENV_BUS_CAPACITY, "64"),
        ]))
        .unwrap();
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(cfg.gate_acquire_timeout, Duration::from_millis(250));
        assert_eq!(cfg.handler_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.bus_capacity, 64);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let err = ExecutorConfig::from_lookup(lookup(&[(ENV_SHUTDOWN_TIMEOUT_SECS, "ten")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_SHUTDOWN_TIMEOUT_SECS,
                value: "ten".into()
            }
        );
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = ExecutorConfig {
            bus_capacity: 0,
            ..ExecutorConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
