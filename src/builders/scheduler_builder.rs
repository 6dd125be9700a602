//! Fluent construction of a [`Scheduler`].

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{AuditSink, Scheduler, SchedulerError, SchedulerGuard};

/// Builds a validated, optionally started [`Scheduler`].
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::from_env()?
///     .max_workers(8)
///     .audit(Arc::new(InMemoryAuditSink::new(1024)))
///     .start()?;
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    audit: Option<Arc<dyn AuditSink>>,
}

impl SchedulerBuilder {
    /// Start from default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config, audit: None }
    }

    /// Start from environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if a variable is malformed.
    pub fn from_env() -> Result<Self, SchedulerError> {
        SchedulerConfig::from_env()
            .map(Self::with_config)
            .map_err(SchedulerError::InvalidConfig)
    }

    /// Override the worker count.
    #[must_use]
    pub const fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Override the dispatcher poll interval.
    #[must_use]
    pub const fn dispatch_poll_ms(mut self, ms: u64) -> Self {
        self.config.dispatch_poll_ms = ms;
        self
    }

    /// Override the shutdown join timeout.
    #[must_use]
    pub const fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// Report lifecycle events to `sink`.
    #[must_use]
    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Validate and build an uninitialized scheduler.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if validation fails.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        Scheduler::build(self.config, self.audit)
    }

    /// Build and initialize.
    ///
    /// # Errors
    ///
    /// `InvalidConfig`, or `Internal` if threads cannot be spawned.
    pub fn start(self) -> Result<Scheduler, SchedulerError> {
        let scheduler = self.build()?;
        scheduler.initialize()?;
        Ok(scheduler)
    }

    /// Build and initialize behind a guard that drains and shuts the
    /// scheduler down when dropped.
    ///
    /// # Errors
    ///
    /// Same as [`SchedulerBuilder::start`].
    pub fn start_scoped(self) -> Result<SchedulerGuard, SchedulerError> {
        self.build()?.scoped()
    }
}
