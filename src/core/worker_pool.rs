//! Fixed-size worker pool executing job closures on dedicated OS threads.
//!
//! # Key Features
//!
//! - **Bounded parallelism**: exactly `max_workers` threads, so at most that
//!   many jobs execute at once
//! - **Pool-side backpressure**: handing a job over never blocks; excess work
//!   waits in the pool's internal channel
//! - **Contained failures**: errors and panics are captured on the job's
//!   result slot and never reach the worker loop

mod native;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audit::{AuditAction, AuditEvent, AuditSink};
use super::handle::ResultSlot;
use super::job::JobFn;
use super::registry::JobRegistry;
use super::{JobMeta, JobOutcome};

pub use native::WorkerPool;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing jobs.
    pub active_tasks: u64,
    /// Jobs handed to the pool and waiting for a free worker.
    pub queued_tasks: u64,
    /// Jobs that produced a value.
    pub completed_tasks: u64,
    /// Jobs that returned an error or panicked.
    pub failed_tasks: u64,
    /// Jobs dropped by a non-draining shutdown.
    pub cancelled_tasks: u64,
    /// Jobs handed to the pool.
    pub submitted_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
        }
    }
}

/// A job as handed from the dispatcher to the pool.
pub(crate) struct DispatchedJob {
    pub meta: JobMeta,
    pub run: JobFn,
    pub slot: Arc<ResultSlot>,
}

/// Shared tail of every job's life: resolve the slot, publish the completion,
/// move the registry entry, record the audit event. Runs exactly once per job.
pub(crate) fn settle(
    meta: &JobMeta,
    slot: &ResultSlot,
    outcome: JobOutcome,
    registry: &JobRegistry,
    audit: Option<&Arc<dyn AuditSink>>,
) {
    let action = match &outcome {
        Ok(_) => AuditAction::Succeeded,
        Err(e) if e.is_cancelled() => AuditAction::Cancelled,
        Err(_) => AuditAction::Failed,
    };
    if !slot.resolve(outcome.clone()) {
        tracing::error!(job_id = %meta.id, "result slot resolved twice; keeping first outcome");
        return;
    }
    registry.complete(meta, &outcome);
    if let Some(sink) = audit {
        sink.record(AuditEvent::new(meta, action));
    }
}

/// Join `handle`, giving up after `timeout`.
///
/// `Some(true)` joined cleanly, `Some(false)` the thread panicked, `None` it
/// is still running and has been detached.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> Option<bool> {
    let (tx, rx) = std::sync::mpsc::channel();
    let joiner = thread::spawn(move || {
        let _ = tx.send(handle.join().is_ok());
    });
    let joined = rx.recv_timeout(timeout).ok();
    if joined.is_some() {
        let _ = joiner.join();
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_stats_default() {
        let stats = PoolStats::default();
        assert_eq!(stats.worker_count, 0);
        assert_eq!(stats.active_tasks, 0);
        assert_eq!(stats.completed_tasks, 0);
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.submitted_tasks.fetch_add(10, Ordering::Relaxed);
        counters.completed_tasks.fetch_add(5, Ordering::Relaxed);
        counters.failed_tasks.fetch_add(2, Ordering::Relaxed);

        let stats = counters.snapshot(4);
        assert_eq!(stats.worker_count, 4);
        assert_eq!(stats.submitted_tasks, 10);
        assert_eq!(stats.completed_tasks, 5);
        assert_eq!(stats.failed_tasks, 2);
    }

    #[test]
    fn test_join_with_timeout() {
        let quick = thread::spawn(|| {});
        assert_eq!(join_with_timeout(quick, Duration::from_secs(1)), Some(true));

        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(300)));
        assert_eq!(join_with_timeout(slow, Duration::from_millis(10)), None);
    }
}
