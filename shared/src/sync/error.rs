use thiserror::Error;

/// Errors raised by the local synchronization primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Not enough participants entered the barrier before the timeout elapsed
    #[error("Barrier timed out after {timeout_ms}ms with {arrived} of {expected} participants")]
    BarrierTimeout {
        expected: usize,
        arrived: usize,
        timeout_ms: u32,
    },
}
