//! Error types for scheduler operations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::{JobId, OperationType};

/// Why a job did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    /// The closure returned an error.
    Failed,
    /// The closure panicked on the worker thread.
    Panicked,
    /// The scheduler shut down before the job started.
    Cancelled,
}

/// Error captured on a job's result slot.
///
/// Cloneable so every reader of the same slot observes the same error.
#[derive(Clone, Error)]
#[error("{inner:#}")]
pub struct JobError {
    kind: JobErrorKind,
    inner: Arc<anyhow::Error>,
}

impl JobError {
    /// Wrap an error returned by a job closure.
    pub fn failed(err: anyhow::Error) -> Self {
        Self {
            kind: JobErrorKind::Failed,
            inner: Arc::new(err),
        }
    }

    /// Build an error from a panic payload caught on a worker thread.
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            kind: JobErrorKind::Panicked,
            inner: Arc::new(anyhow::anyhow!("job panicked: {msg}")),
        }
    }

    /// Error stored on jobs dropped by a non-draining shutdown.
    pub(crate) fn cancelled() -> Self {
        Self {
            kind: JobErrorKind::Cancelled,
            inner: Arc::new(anyhow::anyhow!("job cancelled: scheduler shut down before it started")),
        }
    }

    /// Kind of failure.
    #[must_use]
    pub const fn kind(&self) -> JobErrorKind {
        self.kind
    }

    /// True if the job never ran because the scheduler shut down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == JobErrorKind::Cancelled
    }

    /// The underlying error.
    #[must_use]
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl fmt::Debug for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobError")
            .field("kind", &self.kind)
            .field("error", &format_args!("{:#}", self.inner))
            .finish()
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::failed(err)
    }
}

/// Errors produced by scheduler components.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A bounded wait expired with no eligible item.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    TimeoutExceeded {
        /// What the caller was waiting on.
        waiting_for: String,
        /// The timeout that expired.
        timeout: Duration,
    },
    /// The job's closure failed; surfaced according to the caller's error policy.
    #[error("{operation} job {job_id} failed: {source}")]
    JobFailed {
        /// Failed job.
        job_id: JobId,
        /// Operation type of the failed job.
        operation: OperationType,
        /// Error captured on the result slot.
        #[source]
        source: JobError,
    },
    /// Operation attempted before `initialize()` or after `shutdown()`.
    #[error("scheduler not initialized; call initialize() first")]
    NotInitialized,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A job produced a value of a different type than the reader asked for.
    #[error("job {job_id} did not produce a value of type {expected}")]
    TypeMismatch {
        /// Job whose value was read.
        job_id: JobId,
        /// Requested type name.
        expected: &'static str,
    },
    /// Internal failure (thread spawn, closed channel, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// True for [`SchedulerError::TimeoutExceeded`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded { .. })
    }

    pub(crate) fn timeout(waiting_for: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self::TimeoutExceeded {
            waiting_for: waiting_for.into(),
            timeout: timeout.unwrap_or(Duration::MAX),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
