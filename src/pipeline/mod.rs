//! Evidence pipeline orchestration on top of the scheduler.

pub mod fire_and_forget;
pub mod traits;

pub use fire_and_forget::{run_fire_and_forget, EvidenceBatch, EvidenceReport, ExpandFn, RunCounters};
pub use traits::{ClaimBatch, ClaimRef, EvidenceGatherer};
