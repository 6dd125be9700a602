//! Wall-clock and submission-sequence helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Next value of the process-wide submission sequence.
///
/// Strictly increasing across all threads, so it totally orders jobs of equal
/// weight even when wall-clock timestamps collide.
pub(crate) fn next_sequence() -> u64 {
    SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}
