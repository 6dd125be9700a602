//! Completion mailboxes.

pub mod memory;

pub use memory::CompletionStream;
