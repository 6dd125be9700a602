//! Core scheduling abstractions: jobs, workers, dispatch, completions.

pub mod audit;
pub(crate) mod dispatcher;
pub mod error;
pub mod handle;
pub mod job;
pub mod operation;
pub mod registry;
pub mod scheduler;
pub mod worker_pool;

pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, JobError, JobErrorKind, SchedulerError};
pub use handle::{JobOutcome, JobValue, ResultHandle};
pub use job::{Job, JobId, JobMeta, PartitionKey, PriorityKey};
pub use operation::OperationType;
pub use registry::{Completion, ErrorPolicy, JobRecord, JobRegistry, JobStatus, SchedulerStatus};
pub use scheduler::{wait_all, with_scheduler, Scheduler, SchedulerGuard};
pub use worker_pool::{PoolStats, WorkerPool};
