//! Native `WorkerPool` on OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on channel recv; result slots use Condvar
//! - **Clean shutdown**: dropping the sender unblocks idle workers naturally
//! - **Lock-free counters**: statistics are atomics

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::{join_with_timeout, settle, DispatchedJob, PoolCounters, PoolStats};
use crate::config::SchedulerConfig;
use crate::core::audit::AuditSink;
use crate::core::registry::JobRegistry;
use crate::core::{JobError, SchedulerError};

/// Everything a worker thread needs, shared across the pool.
struct WorkerShared {
    registry: Arc<JobRegistry>,
    audit: Option<Arc<dyn AuditSink>>,
    counters: Arc<PoolCounters>,
    /// Set by a non-draining shutdown: jobs still in the channel are
    /// cancelled instead of executed.
    cancel_pending: AtomicBool,
}

/// Fixed set of worker threads running job closures.
pub struct WorkerPool {
    worker_count: usize,
    /// Task sender (to workers). Option allows clean shutdown by dropping.
    task_tx: Mutex<Option<Sender<DispatchedJob>>>,
    shared: Arc<WorkerShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `config.max_workers` named worker threads.
    ///
    /// # Errors
    ///
    /// `Internal` if a thread cannot be spawned.
    pub(crate) fn new(
        config: &SchedulerConfig,
        registry: Arc<JobRegistry>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self, SchedulerError> {
        let (task_tx, task_rx) = unbounded::<DispatchedJob>();
        let shared = Arc::new(WorkerShared {
            registry,
            audit,
            counters: Arc::new(PoolCounters::default()),
            cancel_pending: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(config.max_workers);
        for worker_id in 0..config.max_workers {
            let handle = spawn_worker(
                worker_id,
                task_rx.clone(),
                Arc::clone(&shared),
                config.thread_stack_size,
            )
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn worker {worker_id}: {e}")))?;
            workers.push(handle);
        }

        info!(worker_count = config.max_workers, "worker pool started");

        Ok(Self {
            worker_count: config.max_workers,
            task_tx: Mutex::new(Some(task_tx)),
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Hand a job to the pool without blocking.
    ///
    /// # Errors
    ///
    /// Gives the job back if the pool has shut down.
    pub(crate) fn execute(&self, job: DispatchedJob) -> Result<(), DispatchedJob> {
        let guard = self.task_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(job);
        };
        // Count before sending: a worker may pick the job up before send returns.
        let counters = &self.shared.counters;
        counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        tx.send(job).map_err(|e| {
            counters.submitted_tasks.fetch_sub(1, Ordering::Relaxed);
            counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            e.into_inner()
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.worker_count
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot(self.worker_count)
    }

    /// Stop accepting jobs and join workers.
    ///
    /// With `drain`, jobs already handed over still run. Without it they are
    /// cancelled; jobs mid-execution always finish. Workers that do not exit
    /// within `join_timeout` are detached.
    pub(crate) fn shutdown(&self, drain: bool, join_timeout: Duration) {
        if !drain {
            self.shared.cancel_pending.store(true, Ordering::Release);
        }
        // Drop the sender to unblock all workers waiting on recv()
        self.task_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            match join_with_timeout(worker, join_timeout) {
                Some(true) => debug!(worker_id = idx, "worker joined"),
                Some(false) => warn!(worker_id = idx, "worker thread panicked"),
                None => warn!(worker_id = idx, "worker did not exit within timeout; detaching"),
            }
        }
        info!(worker_count, drain, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Don't join here; explicit shutdown() is the graceful path
        if self.task_tx.lock().take().is_some() {
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    task_rx: Receiver<DispatchedJob>,
    shared: Arc<WorkerShared>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("factcheck-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");
            // Exits once the sender is dropped and the channel is empty
            for job in &task_rx {
                shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                if shared.cancel_pending.load(Ordering::Acquire) {
                    shared.counters.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                    settle(&job.meta, &job.slot, Err(JobError::cancelled()), &shared.registry, shared.audit.as_ref());
                    continue;
                }
                run_job(worker_id, job, &shared);
            }
            debug!(worker_id, "worker thread exiting");
        })
}

fn run_job(worker_id: usize, job: DispatchedJob, shared: &WorkerShared) {
    let DispatchedJob { meta, run, slot } = job;
    shared.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
    debug!(worker_id, job_id = %meta.id, operation = %meta.operation, "worker executing job");

    let started = Instant::now();
    let outcome = match catch_unwind(AssertUnwindSafe(run)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            error!(worker_id, job_id = %meta.id, operation = %meta.operation, "job panicked");
            Err(JobError::panicked(payload.as_ref()))
        }
    };
    let elapsed_ms = started.elapsed().as_millis();

    match &outcome {
        Ok(_) => {
            shared.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
            debug!(worker_id, job_id = %meta.id, operation = %meta.operation, elapsed_ms, "job completed");
        }
        Err(e) => {
            shared.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
            warn!(worker_id, job_id = %meta.id, operation = %meta.operation, elapsed_ms, error = %e, "job failed");
        }
    }

    settle(&meta, &slot, outcome, &shared.registry, shared.audit.as_ref());
    shared.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
}
