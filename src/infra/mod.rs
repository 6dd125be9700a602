//! In-process infrastructure: the dispatch queue and completion streams.

pub mod mailbox;
pub mod queue;

pub use mailbox::CompletionStream;
pub use queue::PriorityQueue;
