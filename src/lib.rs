//! # Factcheck Scheduler
//!
//! Priority-scheduled job execution for LLM-driven fact-checking, plus a
//! fire-and-forget evidence pipeline built on it.
//!
//! A fact-checking run fans out into many independent, slow, I/O-bound calls:
//! claim extraction against an LLM, evidence lookups against search APIs, link
//! scraping. This crate runs them on a bounded worker pool, dispatches the
//! most valuable work first, and lets callers react to whichever job finishes
//! next instead of waiting for a fixed batch.
//!
//! ## Core Problem Solved
//!
//! - **Rate-limited backends**: parallelism is capped by a small fixed worker
//!   count, not by CPU count
//! - **Uneven latency**: one extraction call can take seconds while evidence
//!   lookups for a faster source are ready to start
//! - **Shared pools**: several runs may share one scheduler without consuming
//!   each other's results
//!
//! ## Key Features
//!
//! - **Weighted priority**: each [`core::OperationType`] has a fixed weight;
//!   heavier work is dispatched first, FIFO within a weight
//! - **Streaming completions**: [`core::Scheduler::await_next`] returns the
//!   next finished job of a type, optionally scoped to a
//!   [`core::PartitionKey`]
//! - **Contained failures**: errors and panics land on the job's
//!   [`core::ResultHandle`], never in the dispatcher or workers
//! - **Dynamic fan-out**: [`pipeline::run_fire_and_forget`] fires evidence
//!   jobs the moment each extraction finishes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use factcheck_scheduler::builders::SchedulerBuilder;
//! use factcheck_scheduler::config::SchedulerConfig;
//! use factcheck_scheduler::core::{ErrorPolicy, OperationType};
//! use std::time::Duration;
//!
//! let scheduler = SchedulerBuilder::from_env()?.start()?;
//!
//! let handle = scheduler.submit(OperationType::ClaimsExtraction, || extract(&source))?;
//! let next = scheduler.await_next_any(Some(Duration::from_secs(10)), None, ErrorPolicy::Raise)?;
//! let claims = handle.wait()?;
//!
//! scheduler.shutdown(true);
//!
//! // Or scope the lifecycle to a closure
//! let claims = factcheck_scheduler::with_scheduler(SchedulerConfig::default(), |s| {
//!     s.map_blocking(OperationType::ClaimsExtraction, sources, extract)
//! })??;
//! ```
//!
//! For complete scenarios, see:
//! - `tests/scheduler_test.rs` - scheduling, partitioning, shutdown
//! - `tests/pipeline_test.rs` - fire-and-forget runs

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Configuration models for the scheduler and the orchestrator.
pub mod config;
/// Core scheduling abstractions: jobs, workers, dispatch, completions.
pub mod core;
/// In-memory queue and completion stream backends.
pub mod infra;
/// Evidence pipeline orchestration.
pub mod pipeline;
/// Async runtime bridge.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    wait_all, with_scheduler, Completion, ErrorPolicy, JobError, OperationType, PartitionKey, ResultHandle,
    Scheduler, SchedulerError, SchedulerGuard,
};
