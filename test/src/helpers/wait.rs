use std::{
    thread,
    time::{Duration, Instant},
};

/// Polls `condition` until it holds or `timeout` passes. Returns whether
/// it held.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
