//! Jobs, identifiers, and partition keys.

use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::handle::ResultSlot;
use super::{JobOutcome, OperationType};
use crate::util::clock::{next_sequence, now_ms};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Opaque tag scoping completion consumption to one logical run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(Arc<str>);

impl PartitionKey {
    /// Wrap a caller-chosen key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Fresh key for an orchestration run.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self::new(format!("{prefix}-{}", Uuid::new_v4()))
    }

    /// Key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PartitionKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

/// Dispatch order key: heavier weight first, then earlier submission.
///
/// Larger keys pop first from the max-heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    weight: u8,
    sequence: Reverse<u64>,
}

impl PriorityKey {
    /// Key for a job of `operation` submitted at `sequence`.
    #[must_use]
    pub const fn new(operation: OperationType, sequence: u64) -> Self {
        Self {
            weight: operation.weight(),
            sequence: Reverse(sequence),
        }
    }

    /// Submission sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence.0
    }
}

pub(crate) type JobFn = Box<dyn FnOnce() -> JobOutcome + Send + 'static>;

/// Metadata shared by queue, registry, and audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    /// Unique identifier.
    pub id: JobId,
    /// Operation type; fixes the weight.
    pub operation: OperationType,
    /// Partition used for completion filtering.
    pub partition: Option<PartitionKey>,
    /// Submission sequence, strictly increasing per process.
    pub sequence: u64,
    /// Submission time, ms since epoch.
    pub created_at_ms: u128,
}

/// Atomic schedulable unit: metadata, closure, result slot.
pub struct Job {
    meta: JobMeta,
    priority: PriorityKey,
    run: JobFn,
    slot: Arc<ResultSlot>,
}

impl Job {
    pub(crate) fn new(
        operation: OperationType,
        partition: Option<PartitionKey>,
        run: JobFn,
        slot: Arc<ResultSlot>,
    ) -> Self {
        let sequence = next_sequence();
        Self {
            meta: JobMeta {
                id: JobId::new(),
                operation,
                partition,
                sequence,
                created_at_ms: now_ms(),
            },
            priority: PriorityKey::new(operation, sequence),
            run,
            slot,
        }
    }

    /// Job metadata.
    #[must_use]
    pub const fn meta(&self) -> &JobMeta {
        &self.meta
    }

    /// Job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.meta.id
    }

    /// Operation type.
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        self.meta.operation
    }

    /// Priority key computed at creation.
    #[must_use]
    pub const fn priority(&self) -> PriorityKey {
        self.priority
    }

    pub(crate) fn into_parts(self) -> (JobMeta, JobFn, Arc<ResultSlot>) {
        (self.meta, self.run, self.slot)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("meta", &self.meta)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}
