//! Fire-and-forget orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{parse_var, EnvLookup};

/// Environment variable overriding [`PipelineConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "PIPELINE_POLL_INTERVAL_MS";
/// Environment variable overriding [`PipelineConfig::drain_timeout_secs`].
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "PIPELINE_DRAIN_TIMEOUT_SECS";

/// Polling cadence and drain limits for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Timeout for each poll of the extraction stream, in milliseconds.
    pub poll_interval_ms: u64,
    /// Bound on the whole evidence drain phase, in seconds. `None` waits
    /// until every evidence job reports.
    pub drain_timeout_secs: Option<u64>,
    /// Interval between progress logs while draining, in seconds.
    pub drain_heartbeat_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            drain_timeout_secs: None,
            drain_heartbeat_secs: 10,
        }
    }
}

impl PipelineConfig {
    /// Set the extraction poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Bound the drain phase.
    #[must_use]
    pub const fn with_drain_timeout_secs(mut self, secs: u64) -> Self {
        self.drain_timeout_secs = Some(secs);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.drain_timeout_secs == Some(0) {
            return Err("drain_timeout_secs must be greater than 0 when set".into());
        }
        if self.drain_heartbeat_secs == 0 {
            return Err("drain_heartbeat_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
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
        if let Some(v) = parse_var(lookup, ENV_POLL_INTERVAL_MS)? {
            cfg.poll_interval_ms = v;
        }
        if let Some(v) = parse_var(lookup, ENV_DRAIN_TIMEOUT_SECS)? {
            cfg.drain_timeout_secs = Some(v);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Extraction poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Drain bound, if any.
    #[must_use]
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_secs.map(Duration::from_secs)
    }

    /// Drain heartbeat interval.
    #[must_use]
    pub const fn drain_heartbeat(&self) -> Duration {
        Duration::from_secs(self.drain_heartbeat_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert!(cfg.drain_timeout().is_none());
    }

    #[test]
    fn test_zero_drain_timeout_rejected() {
        let cfg = PipelineConfig::from_json_str(r#"{ "drain_timeout_secs": 0 }"#);
        assert!(cfg.is_err());
    }

    #[test]
    fn test_lookup_sets_drain_timeout() {
        let cfg = PipelineConfig::from_lookup(&|key| (key == ENV_DRAIN_TIMEOUT_SECS).then(|| "45".into()))
            .unwrap();
        assert_eq!(cfg.drain_timeout(), Some(Duration::from_secs(45)));
    }
}
