//! In-memory blocking priority queue.

use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::Job;

/// Thread-safe max-heap of jobs ordered by weight, then submission order.
///
/// `push` is O(log n); `pop` blocks up to a timeout for the highest-priority
/// job. The lock is never held across the wait.
pub struct PriorityQueue {
    jobs: Mutex<BinaryHeap<Job>>,
    available: Condvar,
}

impl PriorityQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
        }
    }

    /// Insert a job and wake one waiting consumer.
    pub fn push(&self, job: Job) {
        self.jobs.lock().push(job);
        self.available.notify_one();
    }

    /// Insert several jobs under one lock acquisition.
    ///
    /// A consumer never observes a partial batch, so the batch is dispatched in
    /// priority order relative to itself.
    pub fn push_batch(&self, batch: impl IntoIterator<Item = Job>) {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.extend(batch);
        let added = jobs.len() - before;
        drop(jobs);
        for _ in 0..added {
            self.available.notify_one();
        }
    }

    /// Highest-priority job, waiting up to `timeout`.
    ///
    /// `None` means the queue stayed empty until the timeout, or a
    /// [`PriorityQueue::wake_all`] interrupted the wait.
    pub fn pop(&self, timeout: Duration) -> Option<Job> {
        let deadline = Instant::now().checked_add(timeout);
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.pop() {
            return Some(job);
        }
        match deadline {
            Some(deadline) => {
                let _ = self.available.wait_until(&mut jobs, deadline);
            }
            None => self.available.wait(&mut jobs),
        }
        jobs.pop()
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<Job> {
        self.jobs.lock().pop()
    }

    /// Remove and return every queued job, highest priority first.
    pub fn drain(&self) -> Vec<Job> {
        let heap = std::mem::take(&mut *self.jobs.lock());
        heap.into_sorted_vec().into_iter().rev().collect()
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// True when no job is queued.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Wake every blocked `pop` so it can re-check its caller's state.
    pub fn wake_all(&self) {
        self.available.notify_all();
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
