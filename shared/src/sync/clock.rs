use std::time::{Duration, Instant};

/// A monotonic stopwatch measuring milliseconds since creation or the last reset
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Resets the clock, returning the milliseconds elapsed before the reset
    pub fn reset_time(&mut self) -> f32 {
        let elapsed = self.time_f();
        self.reset();
        elapsed
    }

    /// Whole milliseconds elapsed
    pub fn time_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Fractional milliseconds elapsed
    pub fn time_f(&self) -> f32 {
        self.start.elapsed().as_secs_f32() * 1000.0
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
