pub mod barrier;
pub mod clock;
pub mod error;
pub mod monitor;
pub mod timed_lock;

use std::time::{Duration, Instant};

/// Timeout value meaning "wait forever"
pub const TIMEOUT_INDEFINITE: u32 = u32::MAX;

/// Converts a millisecond timeout into an absolute deadline, `None` meaning
/// no deadline at all.
pub fn deadline_after(timeout_ms: u32) -> Option<Instant> {
    if timeout_ms == TIMEOUT_INDEFINITE {
        return None;
    }
    Some(Instant::now() + Duration::from_millis(u64::from(timeout_ms)))
}
