//! Scheduler and worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{parse_var, EnvLookup};

/// Environment variable overriding [`SchedulerConfig::max_workers`].
pub const ENV_MAX_WORKERS: &str = "THREAD_POOL_MAX_WORKERS";
/// Environment variable overriding [`SchedulerConfig::dispatch_poll_ms`].
pub const ENV_DISPATCH_POLL_MS: &str = "SCHEDULER_DISPATCH_POLL_MS";
/// Environment variable overriding [`SchedulerConfig::shutdown_timeout_secs`].
pub const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "SCHEDULER_SHUTDOWN_TIMEOUT_SECS";

const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_DISPATCH_POLL_MS: u64 = 1_000;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Worker pool size, dispatcher cadence, and shutdown limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads. Sized for external API rate limits rather
    /// than CPU count.
    pub max_workers: usize,
    /// How long the dispatcher blocks on an empty queue before re-checking
    /// for shutdown, in milliseconds.
    pub dispatch_poll_ms: u64,
    /// Per-thread join timeout during shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            dispatch_poll_ms: DEFAULT_DISPATCH_POLL_MS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl SchedulerConfig {
    /// Set the worker count.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the dispatcher poll interval.
    #[must_use]
    pub const fn with_dispatch_poll_ms(mut self, ms: u64) -> Self {
        self.dispatch_poll_ms = ms;
        self
    }

    /// Set the shutdown join timeout.
    #[must_use]
    pub const fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.dispatch_poll_ms == 0 {
            return Err("dispatch_poll_ms must be greater than 0".into());
        }
        if self.shutdown_timeout_secs == 0 {
            return Err("shutdown_timeout_secs must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by process environment variables, after loading a
    /// `.env` file if one exists.
    ///
    /// # Errors
    ///
    /// Unparseable variable or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// # Errors
    ///
    /// Unparseable variable or validation failure.
    pub fn from_lookup(lookup: &EnvLookup<'_>) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(v) = parse_var(lookup, ENV_MAX_WORKERS)? {
            cfg.max_workers = v;
        }
        if let Some(v) = parse_var(lookup, ENV_DISPATCH_POLL_MS)? {
            cfg.dispatch_poll_ms = v;
        }
        if let Some(v) = parse_var(lookup, ENV_SHUTDOWN_TIMEOUT_SECS)? {
            cfg.shutdown_timeout_secs = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Dispatcher poll interval.
    #[must_use]
    pub const fn dispatch_poll(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_ms)
    }

    /// Shutdown join timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_workers, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cfg = SchedulerConfig::default().with_max_workers(0);
        assert!(cfg.validate().unwrap_err().contains("max_workers"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = SchedulerConfig::from_json_str(r#"{ "max_workers": 8 }"#).unwrap();
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.dispatch_poll_ms, 1_000);
    }

    #[test]
    fn test_lookup_overrides() {
        let cfg = SchedulerConfig::from_lookup(&|key| match key {
            ENV_MAX_WORKERS => Some("2".into()),
            ENV_DISPATCH_POLL_MS => Some("50".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.max_workers, 2);
        assert_eq!(cfg.dispatch_poll(), Duration::from_millis(50));
        assert_eq!(cfg.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = SchedulerConfig::from_lookup(&|key| (key == ENV_MAX_WORKERS).then(|| "four".into()))
            .unwrap_err();
        assert!(err.contains(ENV_MAX_WORKERS));
    }
}
