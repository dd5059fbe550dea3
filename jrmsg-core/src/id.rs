//! Request id issuance
//!
//! Ids are positive, strictly increasing, and never reused within one
//! counter. A counter is one correlation domain: share it (e.g. through an
//! `Arc`) between everything that builds requests for the same peer.
//!
//! There is no process-wide counter. Two contexts that should never clash
//! on ids must be handed the same counter explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request id counter
///
/// Safe to use from many threads at once; every call to [`IdCounter::next_id`]
/// returns a value no other call has returned.
#[derive(Debug, Default)]
pub struct IdCounter {
    last: AtomicU64,
}

impl IdCounter {
    /// Create a counter whose first id is 1
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Issue the next id
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently issued id, or 0 if none has been issued
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
