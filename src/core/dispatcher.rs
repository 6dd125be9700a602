//! Single control thread moving jobs from the priority queue to the pool.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::audit::{AuditAction, AuditEvent, AuditSink};
use super::registry::JobRegistry;
use super::worker_pool::{join_with_timeout, settle, DispatchedJob, WorkerPool};
use super::{Job, JobError, SchedulerError};
use crate::infra::PriorityQueue;

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const STOPPING: u8 = 2;

/// Everything the dispatch loop touches.
pub(crate) struct DispatchContext {
    pub queue: Arc<PriorityQueue>,
    pub pool: Arc<WorkerPool>,
    pub registry: Arc<JobRegistry>,
    pub audit: Option<Arc<dyn AuditSink>>,
    pub poll: Duration,
}

/// Handle to the running dispatcher thread.
pub(crate) struct Dispatcher {
    state: Arc<AtomicU8>,
    queue: Arc<PriorityQueue>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start the dispatch loop on a thread named `factcheck-dispatcher`.
    ///
    /// # Errors
    ///
    /// `Internal` if the thread cannot be spawned.
    pub(crate) fn spawn(ctx: DispatchContext) -> Result<Self, SchedulerError> {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let queue = Arc::clone(&ctx.queue);
        let loop_state = Arc::clone(&state);
        let thread = thread::Builder::new()
            .name("factcheck-dispatcher".into())
            .spawn(move || dispatch_loop(&ctx, &loop_state))
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn dispatcher: {e}")))?;

        Ok(Self {
            state,
            queue,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop the loop and join the thread.
    ///
    /// With `drain` the loop first hands every queued job to the pool; without
    /// it the loop exits after its current job and leaves the rest queued.
    pub(crate) fn stop(&self, drain: bool, join_timeout: Duration) {
        let next = if drain { DRAINING } else { STOPPING };
        self.state.store(next, Ordering::Release);
        self.queue.wake_all();

        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        match join_with_timeout(thread, join_timeout) {
            Some(true) => debug!("dispatcher joined"),
            Some(false) => warn!("dispatcher thread panicked"),
            None => warn!("dispatcher did not exit within timeout; detaching"),
        }
    }
}

fn dispatch_loop(ctx: &DispatchContext, state: &AtomicU8) {
    info!(poll_ms = ctx.poll.as_millis(), "dispatcher started");
    let mut dispatched: u64 = 0;
    loop {
        match state.load(Ordering::Acquire) {
            STOPPING => break,
            DRAINING if ctx.queue.is_empty() => break,
            _ => {}
        }
        let Some(job) = ctx.queue.pop(ctx.poll) else {
            continue;
        };
        dispatch(ctx, job);
        dispatched += 1;
    }
    info!(dispatched, "dispatcher stopped");
}

fn dispatch(ctx: &DispatchContext, job: Job) {
    let (meta, run, slot) = job.into_parts();
    ctx.registry.mark_running(&meta);
    if let Some(sink) = &ctx.audit {
        sink.record(AuditEvent::new(&meta, AuditAction::Dispatched));
    }
    debug!(job_id = %meta.id, operation = %meta.operation, sequence = meta.sequence, "job dispatched");

    if let Err(rejected) = ctx.pool.execute(DispatchedJob { meta, run, slot }) {
        warn!(job_id = %rejected.meta.id, "worker pool closed; cancelling job");
        settle(
            &rejected.meta,
            &rejected.slot,
            Err(JobError::cancelled()),
            &ctx.registry,
            ctx.audit.as_ref(),
        );
    }
}
