//! Configuration models for the scheduler and the orchestrator.

pub mod pipeline;
pub mod scheduler;

use std::str::FromStr;

pub use pipeline::PipelineConfig;
pub use scheduler::SchedulerConfig;

/// Variable lookup used by `from_lookup`; `std::env::var` in production.
pub type EnvLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn parse_var<T>(lookup: &EnvLookup<'_>, key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("{key}={raw:?} is invalid: {e}"))
        })
        .transpose()
}
