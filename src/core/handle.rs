//! Write-once, read-many result slots and typed handles over them.
//!
//! A worker resolves the slot exactly once; any number of readers may block on
//! it. Waiting uses a `parking_lot` `Condvar`, never polling.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{JobError, JobId, OperationType, SchedulerError};

/// Type-erased value produced by a job.
#[derive(Clone)]
pub struct JobValue(Arc<dyn Any + Send + Sync>);

impl JobValue {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Shared pointer to the value as `T`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value is not a `T`.
    pub fn downcast_arc<T: Any + Send + Sync>(self) -> Result<Arc<T>, Self> {
        self.0.downcast::<T>().map_err(Self)
    }

    /// Clone the value out as `T`.
    #[must_use]
    pub fn cloned<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for JobValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JobValue(..)")
    }
}

/// Terminal state of a job: a value xor an error.
pub type JobOutcome = Result<JobValue, JobError>;

/// Write-once slot resolved by the executing worker.
pub(crate) struct ResultSlot {
    outcome: Mutex<Option<JobOutcome>>,
    ready: Condvar,
}

impl ResultSlot {
    pub(crate) fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store the outcome and wake every waiter. Returns false if the slot was
    /// already resolved; the first outcome wins.
    pub(crate) fn resolve(&self, outcome: JobOutcome) -> bool {
        let mut slot = self.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.ready.notify_all();
        true
    }

    pub(crate) fn peek(&self) -> Option<JobOutcome> {
        (*self.outcome.lock()).clone()
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.outcome.lock().is_some()
    }

    /// Block until resolved or `timeout` elapses. `None` waits forever.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Option<JobOutcome> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut slot = self.outcome.lock();
        while slot.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.ready.wait(&mut slot),
            }
        }
        (*slot).clone()
    }
}

/// Handle to the eventual result of a submitted job.
///
/// Cloning the handle shares the slot; every clone observes the same outcome.
pub struct ResultHandle<T> {
    job_id: JobId,
    operation: OperationType,
    slot: Arc<ResultSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        Self {
            job_id: self.job_id,
            operation: self.operation,
            slot: Arc::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("job_id", &self.job_id)
            .field("operation", &self.operation)
            .field("resolved", &self.slot.is_resolved())
            .finish()
    }
}

impl<T> ResultHandle<T> {
    pub(crate) const fn new(job_id: JobId, operation: OperationType, slot: Arc<ResultSlot>) -> Self {
        Self {
            job_id,
            operation,
            slot,
            _marker: PhantomData,
        }
    }

    /// Identifier of the job behind this handle.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Operation type the job was submitted with.
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        self.operation
    }

    /// True once the job has a value or an error.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }

    /// Wait for the untyped outcome.
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` if the job is not resolved within `timeout`.
    pub fn outcome(&self, timeout: Option<Duration>) -> Result<JobOutcome, SchedulerError> {
        self.slot
            .wait(timeout)
            .ok_or_else(|| SchedulerError::timeout(format!("job {}", self.job_id), timeout))
    }
}

impl<T: Any + Clone + Send + Sync> ResultHandle<T> {
    /// Block until the job finishes.
    ///
    /// # Errors
    ///
    /// `JobFailed` if the job's closure failed.
    pub fn wait(&self) -> Result<T, SchedulerError> {
        self.wait_timeout(None)
    }

    /// Block until the job finishes or `timeout` elapses.
    ///
    /// A timed-out wait does not cancel the job.
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` on expiry, `JobFailed` if the closure failed.
    pub fn wait_timeout(&self, timeout: Option<Duration>) -> Result<T, SchedulerError> {
        let outcome = self.outcome(timeout)?;
        self.typed(outcome)
    }

    /// Non-blocking read: `None` while the job is still pending.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<T, SchedulerError>> {
        self.slot.peek().map(|outcome| self.typed(outcome))
    }

    pub(crate) fn typed(&self, outcome: JobOutcome) -> Result<T, SchedulerError> {
        match outcome {
            Ok(value) => value.cloned::<T>().ok_or(SchedulerError::TypeMismatch {
                job_id: self.job_id,
                expected: type_name::<T>(),
            }),
            Err(source) => Err(SchedulerError::JobFailed {
                job_id: self.job_id,
                operation: self.operation,
                source,
            }),
        }
    }
}
