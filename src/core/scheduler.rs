//! Public scheduler facade.
//!
//! `Scheduler` is a cheap `Clone` handle. Construct it once, call
//! [`Scheduler::initialize`], and pass clones to whoever submits or consumes
//! jobs. There is no process-wide instance.

use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::audit::{AuditAction, AuditEvent, AuditSink};
use super::dispatcher::{DispatchContext, Dispatcher};
use super::handle::{ResultHandle, ResultSlot};
use super::registry::{Completion, ErrorPolicy, JobRecord, JobRegistry, SchedulerStatus};
use super::worker_pool::{settle, PoolStats, WorkerPool};
use super::{Job, JobError, JobId, JobValue, OperationType, PartitionKey, SchedulerError};
use crate::config::SchedulerConfig;
use crate::infra::PriorityQueue;

/// Dispatcher and pool alive between `initialize` and `shutdown`.
struct Running {
    pool: Arc<WorkerPool>,
    dispatcher: Dispatcher,
}

struct Inner {
    config: SchedulerConfig,
    audit: Option<Arc<dyn AuditSink>>,
    queue: Arc<PriorityQueue>,
    registry: Arc<JobRegistry>,
    running: RwLock<Option<Running>>,
}

/// Priority-scheduled job execution with streaming completion consumption.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create an uninitialized scheduler.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::build(config, None)
    }

    /// Create an uninitialized scheduler that reports lifecycle events to `audit`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn with_audit(config: SchedulerConfig, audit: Arc<dyn AuditSink>) -> Result<Self, SchedulerError> {
        Self::build(config, Some(audit))
    }

    pub(crate) fn build(
        config: SchedulerConfig,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                audit,
                queue: Arc::new(PriorityQueue::new()),
                registry: Arc::new(JobRegistry::new()),
                running: RwLock::new(None),
            }),
        })
    }

    /// Start the worker pool and the dispatcher. No-op when already running;
    /// allowed again after [`Scheduler::shutdown`].
    ///
    /// # Errors
    ///
    /// `Internal` if a thread cannot be spawned.
    pub fn initialize(&self) -> Result<(), SchedulerError> {
        let mut running = self.inner.running.write();
        if running.is_some() {
            debug!("scheduler already initialized");
            return Ok(());
        }

        let pool = Arc::new(WorkerPool::new(
            &self.inner.config,
            Arc::clone(&self.inner.registry),
            self.inner.audit.clone(),
        )?);
        let dispatcher = Dispatcher::spawn(DispatchContext {
            queue: Arc::clone(&self.inner.queue),
            pool: Arc::clone(&pool),
            registry: Arc::clone(&self.inner.registry),
            audit: self.inner.audit.clone(),
            poll: self.inner.config.dispatch_poll(),
        });
        let dispatcher = match dispatcher {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                pool.shutdown(false, self.inner.config.shutdown_timeout());
                return Err(e);
            }
        };

        *running = Some(Running { pool, dispatcher });
        info!(max_workers = self.inner.config.max_workers, "scheduler initialized");
        Ok(())
    }

    /// Stop accepting work and stop the dispatcher and workers. No-op when not
    /// running.
    ///
    /// With `drain`, every job already queued is dispatched and run first.
    /// Without it, jobs that have not started are resolved with a cancelled
    /// error and still emit completion records. Running jobs always finish.
    pub fn shutdown(&self, drain: bool) {
        // Release the lock before joining: job closures may call back into the
        // scheduler and must see it as stopped rather than block.
        let Some(Running { pool, dispatcher }) = self.inner.running.write().take() else {
            debug!("scheduler not running; shutdown ignored");
            return;
        };
        info!(drain, queued = self.inner.queue.len(), "scheduler shutting down");

        let timeout = self.inner.config.shutdown_timeout();
        dispatcher.stop(drain, timeout);
        pool.shutdown(drain, timeout);

        let leftovers = self.inner.queue.drain();
        if drain && !leftovers.is_empty() {
            warn!(count = leftovers.len(), "jobs left queued after drain; cancelling");
        }
        let cancelled = leftovers.len();
        for job in leftovers {
            let (meta, _run, slot) = job.into_parts();
            settle(&meta, &slot, Err(JobError::cancelled()), &self.inner.registry, self.inner.audit.as_ref());
        }
        info!(cancelled, "scheduler shut down");
    }

    /// True between `initialize` and `shutdown`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.running.read().is_some()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Queue a job with no partition key.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize` or after `shutdown`.
    pub fn submit<T, F>(&self, operation: OperationType, f: F) -> Result<ResultHandle<T>, SchedulerError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.enqueue(operation, None, f)
    }

    /// Queue a job whose completion is tagged with `partition`.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize` or after `shutdown`.
    pub fn submit_with_partition<T, F>(
        &self,
        operation: OperationType,
        partition: PartitionKey,
        f: F,
    ) -> Result<ResultHandle<T>, SchedulerError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.enqueue(operation, Some(partition), f)
    }

    /// Queue several jobs atomically: the dispatcher sees the whole batch at
    /// once, so it runs in priority order regardless of the order given.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize` or after `shutdown`.
    pub fn submit_batch<T, F>(
        &self,
        jobs: impl IntoIterator<Item = (OperationType, F)>,
        partition: Option<&PartitionKey>,
    ) -> Result<Vec<ResultHandle<T>>, SchedulerError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let running = self.inner.running.read();
        if running.is_none() {
            return Err(SchedulerError::NotInitialized);
        }
        let (batch, handles): (Vec<Job>, Vec<ResultHandle<T>>) = jobs
            .into_iter()
            .map(|(operation, f)| self.prepare(operation, partition.cloned(), f))
            .unzip();
        debug!(count = batch.len(), "job batch submitted");
        self.inner.queue.push_batch(batch);
        drop(running);
        Ok(handles)
    }

    fn enqueue<T, F>(
        &self,
        operation: OperationType,
        partition: Option<PartitionKey>,
        f: F,
    ) -> Result<ResultHandle<T>, SchedulerError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        // Held across the push so shutdown cannot slip in between the check
        // and the enqueue.
        let running = self.inner.running.read();
        if running.is_none() {
            return Err(SchedulerError::NotInitialized);
        }
        let (job, handle) = self.prepare(operation, partition, f);
        self.inner.queue.push(job);
        drop(running);
        Ok(handle)
    }

    fn prepare<T, F>(
        &self,
        operation: OperationType,
        partition: Option<PartitionKey>,
        f: F,
    ) -> (Job, ResultHandle<T>)
    where
        T: Any + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let slot = Arc::new(ResultSlot::new());
        let run = Box::new(move || f().map(JobValue::new).map_err(JobError::failed));
        let job = Job::new(operation, partition, run, Arc::clone(&slot));
        let handle = ResultHandle::new(job.id(), operation, slot);
        self.inner.registry.admit(job.meta());

        if let Some(sink) = &self.inner.audit {
            sink.record(AuditEvent::new(job.meta(), AuditAction::Submitted));
        }
        debug!(job_id = %job.id(), %operation, partition = ?job.meta().partition, "job submitted");
        (job, handle)
    }

    /// Submit and block until the job finishes.
    ///
    /// Without a `partition` the job runs under a private one that is released
    /// afterwards, so its completion record never reaches the streams.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `JobFailed` carrying the job's own error.
    pub fn submit_and_await<T, F>(
        &self,
        operation: OperationType,
        f: F,
        partition: Option<PartitionKey>,
    ) -> Result<T, SchedulerError>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        if let Some(partition) = partition {
            return self.enqueue(operation, Some(partition), f)?.wait();
        }
        let private = self.private_partition("await");
        self.enqueue(operation, Some(private.key().clone()), f)?.wait()
    }

    /// Fresh partition released when the returned guard drops.
    pub(crate) fn private_partition(&self, prefix: &str) -> PartitionRelease<'_> {
        PartitionRelease {
            registry: &self.inner.registry,
            partition: PartitionKey::generate(prefix),
        }
    }

    /// Next finished job of `operation`, optionally restricted to `partition`.
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` if nothing eligible finishes within `timeout`;
    /// `JobFailed` for a failed job under [`ErrorPolicy::Raise`].
    pub fn await_next(
        &self,
        operation: OperationType,
        timeout: Option<Duration>,
        partition: Option<&PartitionKey>,
        policy: ErrorPolicy,
    ) -> Result<Completion, SchedulerError> {
        self.inner.registry.await_next(operation, timeout, partition, policy)
    }

    /// Next finished job of any operation type.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::await_next`].
    pub fn await_next_any(
        &self,
        timeout: Option<Duration>,
        partition: Option<&PartitionKey>,
        policy: ErrorPolicy,
    ) -> Result<Completion, SchedulerError> {
        self.inner.registry.await_next_any(timeout, partition, policy)
    }

    /// Discard unconsumed completion records of `partition`; `None` targets
    /// jobs submitted without one.
    pub fn clear_completed(&self, partition: Option<&PartitionKey>, operation: Option<OperationType>) -> usize {
        self.inner.registry.clear_completed(partition, operation)
    }

    /// Run [`Scheduler::clear_completed`] on a background thread.
    ///
    /// The handle resolves to the number of records discarded. It reports
    /// `operation`, or [`OperationType::LinkEvidenceRetriever`] when clearing
    /// every type.
    ///
    /// # Errors
    ///
    /// `Internal` if the cleanup thread cannot be spawned.
    pub fn clear_completed_async(
        &self,
        partition: Option<PartitionKey>,
        operation: Option<OperationType>,
    ) -> Result<ResultHandle<usize>, SchedulerError> {
        let slot = Arc::new(ResultSlot::new());
        let handle = ResultHandle::new(
            JobId::new(),
            operation.unwrap_or(OperationType::LinkEvidenceRetriever),
            Arc::clone(&slot),
        );
        let registry = Arc::clone(&self.inner.registry);
        thread::Builder::new()
            .name("factcheck-cleanup".into())
            .spawn(move || {
                let cleared = registry.clear_completed(partition.as_ref(), operation);
                slot.resolve(Ok(JobValue::new(cleared)));
            })
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn cleanup thread: {e}")))?;
        Ok(handle)
    }

    /// Stop consuming `partition`: discard its records now and drop those of
    /// its jobs still in flight when they finish.
    pub fn release_partition(&self, partition: &PartitionKey) -> usize {
        self.inner.registry.release_partition(partition)
    }

    /// Registry entry for a job.
    #[must_use]
    pub fn job_record(&self, id: JobId) -> Option<JobRecord> {
        self.inner.registry.job_record(id)
    }

    /// Forget completed jobs older than `max_age`.
    pub fn prune_completed(&self, max_age: Duration) -> usize {
        self.inner.registry.prune_completed(max_age)
    }

    /// Queue depth, running and completed counts, capacity.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let (running, completed) = self.inner.registry.counts();
        SchedulerStatus {
            queued: self.inner.queue.len(),
            running,
            completed,
            capacity: self.inner.config.max_workers,
            initialized: self.is_initialized(),
        }
    }

    /// Worker pool counters; `None` when not running.
    #[must_use]
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.inner.running.read().as_ref().map(|r| r.pool.stats())
    }

    /// Apply `f` to every item in parallel and return results in input order.
    /// The jobs' completion records never reach the streams.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or the first failing item's `JobFailed`.
    pub fn map_blocking<I, T, F>(
        &self,
        operation: OperationType,
        items: impl IntoIterator<Item = I>,
        f: F,
    ) -> Result<Vec<T>, SchedulerError>
    where
        I: Send + 'static,
        T: Any + Clone + Send + Sync,
        F: Fn(I) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let private = self.private_partition("map");
        let handles = self.submit_each(operation, private.key(), items, f)?;
        wait_all(&handles, None)
    }

    pub(crate) fn submit_each<I, T, F>(
        &self,
        operation: OperationType,
        partition: &PartitionKey,
        items: impl IntoIterator<Item = I>,
        f: F,
    ) -> Result<Vec<ResultHandle<T>>, SchedulerError>
    where
        I: Send + 'static,
        T: Any + Send + Sync,
        F: Fn(I) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        items
            .into_iter()
            .map(|item| {
                let f = Arc::clone(&f);
                self.enqueue(operation, Some(partition.clone()), move || f(item))
            })
            .collect()
    }
}

/// Releases a partition on drop. Used by helpers whose callers only ever
/// see result handles.
pub(crate) struct PartitionRelease<'a> {
    registry: &'a JobRegistry,
    partition: PartitionKey,
}

impl PartitionRelease<'_> {
    pub(crate) const fn key(&self) -> &PartitionKey {
        &self.partition
    }
}

impl Drop for PartitionRelease<'_> {
    fn drop(&mut self) {
        self.registry.release_partition(&self.partition);
    }
}

/// Initialized scheduler that drains and shuts down when dropped.
///
/// Created by [`Scheduler::scoped`]; derefs to the scheduler it owns.
#[derive(Debug)]
pub struct SchedulerGuard {
    scheduler: Scheduler,
}

impl SchedulerGuard {
    /// A clone of the guarded handle. Clones do not extend the scope.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }
}

impl Deref for SchedulerGuard {
    type Target = Scheduler;

    fn deref(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        self.scheduler.shutdown(true);
    }
}

impl Scheduler {
    /// Initialize and return a guard that runs `shutdown(true)` on drop.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::initialize`].
    pub fn scoped(&self) -> Result<SchedulerGuard, SchedulerError> {
        self.initialize()?;
        Ok(SchedulerGuard {
            scheduler: self.clone(),
        })
    }
}

/// Run `f` against a scheduler that lives exactly as long as the call.
///
/// # Errors
///
/// `InvalidConfig` or `Internal` if the scheduler cannot start. Errors of
/// `f` itself are part of `R`.
pub fn with_scheduler<R>(config: SchedulerConfig, f: impl FnOnce(&Scheduler) -> R) -> Result<R, SchedulerError> {
    let guard = Scheduler::new(config)?.scoped()?;
    Ok(f(&guard.scheduler))
}

/// Wait for every handle, in order, sharing one overall `timeout`.
///
/// # Errors
///
/// `TimeoutExceeded` once the shared deadline passes; otherwise the first
/// failed job's error.
pub fn wait_all<T>(handles: &[ResultHandle<T>], timeout: Option<Duration>) -> Result<Vec<T>, SchedulerError>
where
    T: Any + Clone + Send + Sync,
{
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    handles
        .iter()
        .map(|handle| {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            handle.wait_timeout(remaining)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit::InMemoryAuditSink;

    fn scheduler(workers: usize) -> Scheduler {
        let config = SchedulerConfig::default()
            .with_max_workers(workers)
            .with_dispatch_poll_ms(10);
        let scheduler = Scheduler::new(config).unwrap();
        scheduler.initialize().unwrap();
        scheduler
    }

    #[test]
    fn test_submit_before_initialize() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        let err = scheduler
            .submit(OperationType::ClaimsExtraction, || Ok(1_u8))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NotInitialized));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Scheduler::new(SchedulerConfig::default().with_max_workers(0)).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn test_initialize_and_shutdown_are_idempotent() {
        let scheduler = scheduler(2);
        scheduler.initialize().unwrap();
        assert!(scheduler.is_initialized());
        scheduler.shutdown(true);
        scheduler.shutdown(true);
        assert!(!scheduler.is_initialized());

        scheduler.initialize().unwrap();
        let value = scheduler
            .submit_and_await(OperationType::ClaimsExtraction, || Ok(5_u32), None)
            .unwrap();
        assert_eq!(value, 5);
        scheduler.shutdown(true);
    }

    #[test]
    fn test_submit_records_audit_trail() {
        let sink = Arc::new(InMemoryAuditSink::new(16));
        let scheduler = Scheduler::with_audit(
            SchedulerConfig::default().with_dispatch_poll_ms(10),
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        )
        .unwrap();
        scheduler.initialize().unwrap();
        let handle = scheduler
            .submit(OperationType::LinkContextExpanding, || Ok("page".to_string()))
            .unwrap();
        assert_eq!(handle.wait().unwrap(), "page");
        scheduler.shutdown(true);

        let actions: Vec<AuditAction> = sink
            .events()
            .iter()
            .filter(|e| e.job_id == handle.job_id())
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![AuditAction::Submitted, AuditAction::Dispatched, AuditAction::Succeeded]
        );
    }

    #[test]
    fn test_wait_all_preserves_order() {
        let scheduler = scheduler(4);
        let handles: Vec<_> = (0..8_u64)
            .map(|i| {
                scheduler
                    .submit(OperationType::LinkEvidenceRetriever, move || {
                        std::thread::sleep(Duration::from_millis(8 - i));
                        Ok(i * 10)
                    })
                    .unwrap()
            })
            .collect();
        let values = wait_all(&handles, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(values, (0..8).map(|i| i * 10).collect::<Vec<_>>());
        scheduler.shutdown(true);
    }

    #[test]
    fn test_status_counts() {
        let scheduler = scheduler(1);
        scheduler
            .submit_and_await(OperationType::ClaimsExtraction, || Ok(()), None)
            .unwrap();
        assert!(scheduler.status().initialized);

        // Joining the workers guarantees the registry move has happened
        scheduler.shutdown(true);
        let status = scheduler.status();
        assert_eq!(status.capacity, 1);
        assert_eq!(status.completed, 1);
        assert_eq!(status.running, 0);
        assert!(!status.initialized);
    }
}
