//! Job registry and streaming completion consumption.
//!
//! Tracks running and completed jobs under one lock and fans every finished
//! job out to two completion streams: one per operation type and one global.
//! Consumers block on whichever stream they care about and react to the next
//! finished job, optionally scoped to a partition key.

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{JobId, JobMeta, JobOutcome, OperationType, PartitionKey, SchedulerError};
use crate::infra::CompletionStream;
use crate::util::clock::now_ms;

/// Record emitted exactly once per finished job.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Finished job.
    pub job_id: JobId,
    /// Its operation type.
    pub operation: OperationType,
    /// Its partition key, if any.
    pub partition: Option<PartitionKey>,
    /// Value or error.
    pub outcome: JobOutcome,
}

impl Completion {
    /// True if this record is eligible for a consumer filtering on `partition`.
    #[must_use]
    pub fn matches(&self, partition: Option<&PartitionKey>) -> bool {
        partition.is_none_or(|p| self.partition.as_ref() == Some(p))
    }

    /// True if the job produced a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Clone the value out as `T`.
    ///
    /// # Errors
    ///
    /// `JobFailed` if the job failed, `TypeMismatch` if the value is not a `T`.
    pub fn value<T: Any + Clone>(&self) -> Result<T, SchedulerError> {
        match &self.outcome {
            Ok(value) => value.cloned::<T>().ok_or(SchedulerError::TypeMismatch {
                job_id: self.job_id,
                expected: type_name::<T>(),
            }),
            Err(source) => Err(SchedulerError::JobFailed {
                job_id: self.job_id,
                operation: self.operation,
                source: source.clone(),
            }),
        }
    }

    fn apply(self, policy: ErrorPolicy) -> Result<Self, SchedulerError> {
        match (&self.outcome, policy) {
            (Err(source), ErrorPolicy::Raise) => Err(SchedulerError::JobFailed {
                job_id: self.job_id,
                operation: self.operation,
                source: source.clone(),
            }),
            _ => Ok(self),
        }
    }
}

/// How a consumer wants failed jobs surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Return `SchedulerError::JobFailed`. The record is still consumed.
    #[default]
    Raise,
    /// Return the completion with its error inside `outcome`.
    ReturnAsValue,
}

/// Lifecycle status of a dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Handed to the worker pool.
    Running,
    /// Produced a value.
    Succeeded,
    /// Returned an error or panicked.
    Failed,
    /// Never started; dropped by shutdown.
    Cancelled,
}

/// Registry entry for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job metadata.
    pub meta: JobMeta,
    /// Current status.
    pub status: JobStatus,
    /// When the dispatcher handed it off, ms since epoch.
    pub dispatched_at_ms: Option<u128>,
    /// When it finished, ms since epoch.
    pub finished_at_ms: Option<u128>,
    /// Error message for failed or cancelled jobs.
    pub error: Option<String>,
}

/// Point-in-time scheduler snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Jobs waiting in the priority queue.
    pub queued: usize,
    /// Jobs handed to the pool and not finished.
    pub running: usize,
    /// Finished jobs still tracked.
    pub completed: usize,
    /// Worker pool capacity.
    pub capacity: usize,
    /// Whether the scheduler accepts submissions.
    pub initialized: bool,
}

#[derive(Default)]
struct RegistryState {
    running: HashMap<JobId, JobRecord>,
    completed: HashMap<JobId, JobRecord>,
    /// Admitted, unfinished jobs per partition.
    outstanding: HashMap<PartitionKey, usize>,
    /// Partitions nobody will consume again; their late records are dropped.
    released: HashSet<PartitionKey>,
}

impl RegistryState {
    /// Count one job of `partition` as finished. Returns whether its record
    /// should be published.
    fn finish(&mut self, partition: &PartitionKey) -> bool {
        let remaining = match self.outstanding.get_mut(partition) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.outstanding.remove(partition);
        }
        if !self.released.contains(partition) {
            return true;
        }
        if remaining == 0 {
            self.released.remove(partition);
        }
        false
    }
}

/// Running/completed bookkeeping plus the completion streams.
pub struct JobRegistry {
    state: Mutex<RegistryState>,
    streams: [CompletionStream; OperationType::ALL.len()],
    global: CompletionStream,
}

impl JobRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            streams: std::array::from_fn(|_| CompletionStream::new()),
            global: CompletionStream::new(),
        }
    }

    fn stream(&self, operation: OperationType) -> &CompletionStream {
        &self.streams[operation as usize]
    }

    /// Count a freshly submitted job against its partition.
    pub(crate) fn admit(&self, meta: &JobMeta) {
        if let Some(partition) = &meta.partition {
            *self.state.lock().outstanding.entry(partition.clone()).or_default() += 1;
        }
    }

    /// Record a job as handed to the pool. Only the dispatcher calls this.
    pub(crate) fn mark_running(&self, meta: &JobMeta) {
        let record = JobRecord {
            meta: meta.clone(),
            status: JobStatus::Running,
            dispatched_at_ms: Some(now_ms()),
            finished_at_ms: None,
            error: None,
        };
        self.state.lock().running.insert(meta.id, record);
    }

    /// Publish the completion record to both streams, unless its partition
    /// was released, then move the job from running to completed.
    pub(crate) fn complete(&self, meta: &JobMeta, outcome: &JobOutcome) {
        let (status, error) = match outcome {
            Ok(_) => (JobStatus::Succeeded, None),
            Err(e) if e.is_cancelled() => (JobStatus::Cancelled, Some(e.to_string())),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        };

        // Publishing under the state lock orders it against release_partition.
        let mut state = self.state.lock();
        let publish = meta.partition.as_ref().is_none_or(|p| state.finish(p));
        if publish {
            let completion = Completion {
                job_id: meta.id,
                operation: meta.operation,
                partition: meta.partition.clone(),
                outcome: outcome.clone(),
            };
            self.stream(meta.operation).publish(completion.clone());
            self.global.publish(completion);
        } else {
            tracing::trace!(job_id = %meta.id, "dropped completion of released partition");
        }

        let mut record = state.running.remove(&meta.id).unwrap_or_else(|| JobRecord {
            meta: meta.clone(),
            status,
            dispatched_at_ms: None,
            finished_at_ms: None,
            error: None,
        });
        record.status = status;
        record.finished_at_ms = Some(now_ms());
        record.error = error;
        state.completed.insert(meta.id, record);
    }

    /// Next finished job of `operation`.
    ///
    /// With a `partition`, records of other partitions are skipped in place
    /// and stay queued for their own consumers.
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` if nothing eligible arrives within `timeout`;
    /// `JobFailed` for a failed job under [`ErrorPolicy::Raise`].
    pub fn await_next(
        &self,
        operation: OperationType,
        timeout: Option<Duration>,
        partition: Option<&PartitionKey>,
        policy: ErrorPolicy,
    ) -> Result<Completion, SchedulerError> {
        let completion = self
            .stream(operation)
            .next(timeout, partition)
            .ok_or_else(|| SchedulerError::timeout(scope(Some(operation), partition), timeout))?;
        completion.apply(policy)
    }

    /// Next finished job of any operation type.
    ///
    /// # Errors
    ///
    /// Same as [`JobRegistry::await_next`].
    pub fn await_next_any(
        &self,
        timeout: Option<Duration>,
        partition: Option<&PartitionKey>,
        policy: ErrorPolicy,
    ) -> Result<Completion, SchedulerError> {
        let completion = self
            .global
            .next(timeout, partition)
            .ok_or_else(|| SchedulerError::timeout(scope(None, partition), timeout))?;
        completion.apply(policy)
    }

    /// Discard queued completion records of `partition` without blocking.
    ///
    /// `None` targets records submitted without a partition. Clears the given
    /// operation's stream, or every per-operation stream when `operation` is
    /// `None`, and the matching records on the global stream. Returns how many
    /// per-operation records were discarded.
    pub fn clear_completed(&self, partition: Option<&PartitionKey>, operation: Option<OperationType>) -> usize {
        let ops: Vec<OperationType> = operation.map_or_else(|| OperationType::ALL.to_vec(), |op| vec![op]);
        let cleared: usize = ops
            .iter()
            .map(|op| self.stream(*op).drain_where(|c| c.partition.as_ref() == partition).len())
            .sum();
        self.global
            .drain_where(|c| c.partition.as_ref() == partition && ops.contains(&c.operation));
        tracing::debug!(partition = ?partition, cleared, "cleared completed jobs");
        cleared
    }

    /// Give up on `partition`: discard its queued records, and drop the
    /// records of its jobs still in flight as they finish.
    ///
    /// Returns how many per-operation records were discarded now.
    pub fn release_partition(&self, partition: &PartitionKey) -> usize {
        let mut state = self.state.lock();
        let cleared = self.clear_completed(Some(partition), None);
        if state.outstanding.contains_key(partition) {
            state.released.insert(partition.clone());
        }
        drop(state);
        cleared
    }

    /// Partitions released while jobs were still in flight.
    #[must_use]
    pub fn released_partitions(&self) -> usize {
        self.state.lock().released.len()
    }

    /// Registry entry for `id`, running or completed.
    #[must_use]
    pub fn job_record(&self, id: JobId) -> Option<JobRecord> {
        let state = self.state.lock();
        state
            .running
            .get(&id)
            .or_else(|| state.completed.get(&id))
            .cloned()
    }

    /// Drop completed entries that finished more than `max_age` ago.
    pub fn prune_completed(&self, max_age: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(max_age.as_millis());
        let mut state = self.state.lock();
        let before = state.completed.len();
        state
            .completed
            .retain(|_, r| r.finished_at_ms.is_none_or(|at| at >= cutoff));
        before - state.completed.len()
    }

    /// `(running, completed)` read under the registry lock.
    pub(crate) fn counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.running.len(), state.completed.len())
    }
}

fn scope(operation: Option<OperationType>, partition: Option<&PartitionKey>) -> String {
    let op = operation.map_or_else(|| "any".to_string(), |op| op.to_string());
    match partition {
        Some(p) => format!("{op} completion in partition {p}"),
        None => format!("{op} completion"),
    }
}
