//! Job lifecycle audit trail.
//!
//! Sinks receive one event per lifecycle transition. The in-memory sink keeps
//! a bounded ring buffer for diagnostics and tests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{JobId, JobMeta, OperationType, PartitionKey};
use crate::util::clock::now_ms;

/// Lifecycle transition recorded for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Accepted by the facade and queued.
    Submitted,
    /// Popped by the dispatcher and handed to the worker pool.
    Dispatched,
    /// Closure returned a value.
    Succeeded,
    /// Closure returned an error or panicked.
    Failed,
    /// Dropped by a non-draining shutdown before it started.
    Cancelled,
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Related job.
    pub job_id: JobId,
    /// Operation type of the job.
    pub operation: OperationType,
    /// Partition of the job, if any.
    pub partition: Option<PartitionKey>,
    /// Transition taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub at_ms: u128,
}

impl AuditEvent {
    /// Event for `meta` taking `action` now.
    #[must_use]
    pub fn new(meta: &JobMeta, action: AuditAction) -> Self {
        Self {
            job_id: meta.id,
            operation: meta.operation,
            partition: meta.partition.clone(),
            action,
            at_ms: now_ms(),
        }
    }
}

/// Audit sink abstraction. Called from dispatcher and worker threads.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(4096))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events with the given action, oldest first.
    #[must_use]
    pub fn events_with(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}
