//! Async runtime bridge.
//!
//! The scheduler itself is thread-based; this module lets async callers submit
//! and await jobs without blocking their executor.

#[cfg(feature = "tokio-runtime")]
pub mod async_bridge;
