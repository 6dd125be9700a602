//! In-memory completion stream.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Completion, PartitionKey};

/// FIFO, multi-producer multi-consumer stream of completion records.
///
/// A filtered receive takes the oldest record of its partition and skips the
/// others in place, so they stay queued in order for their own waiters and
/// no consumer ever holds another partition's records.
pub struct CompletionStream {
    records: Mutex<VecDeque<Completion>>,
    arrived: Condvar,
}

impl CompletionStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
        }
    }

    /// Append a record and wake every waiter; each re-checks its own filter.
    pub fn publish(&self, completion: Completion) {
        self.records.lock().push_back(completion);
        self.arrived.notify_all();
    }

    /// Oldest record matching `partition`, waiting up to `timeout`.
    ///
    /// `None` for `partition` accepts any record; `None` for `timeout` waits
    /// forever. Returns `None` if nothing eligible arrived in time.
    pub fn next(
        &self,
        timeout: Option<Duration>,
        partition: Option<&PartitionKey>,
    ) -> Option<Completion> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut records = self.records.lock();
        loop {
            if let Some(pos) = records.iter().position(|c| c.matches(partition)) {
                if pos > 0 {
                    tracing::trace!(skipped = pos, "skipped completions of other partitions");
                }
                return records.remove(pos);
            }
            match deadline {
                Some(deadline) => {
                    if self.arrived.wait_until(&mut records, deadline).timed_out() {
                        return records
                            .iter()
                            .position(|c| c.matches(partition))
                            .and_then(|pos| records.remove(pos));
                    }
                }
                None => self.arrived.wait(&mut records),
            }
        }
    }

    /// Remove every queued record that satisfies `predicate`, without
    /// blocking. The rest keep their order.
    pub fn drain_where(&self, predicate: impl Fn(&Completion) -> bool) -> Vec<Completion> {
        let mut records = self.records.lock();
        let (taken, kept): (VecDeque<_>, VecDeque<_>) = records.drain(..).partition(|c| predicate(c));
        *records = kept;
        taken.into()
    }

    /// Records currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when no record is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for CompletionStream {
    fn default() -> Self {
        Self::new()
    }
}
