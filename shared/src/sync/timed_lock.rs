use log::warn;
use parking_lot::{Condvar, Mutex};

use super::deadline_after;

/// A lock whose acquisition may give up after a timeout.
///
/// Unlike a mutex guard, the lock is not tied to the acquiring thread: any
/// thread may release it.
pub struct TimedLock {
    locked: Mutex<bool>,
    condvar: Condvar,
}

impl TimedLock {
    pub fn new() -> Self {
        Self {
            locked: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Acquires the lock, waiting at most `timeout_ms` milliseconds
    /// ([`TIMEOUT_INDEFINITE`](super::TIMEOUT_INDEFINITE) waits forever).
    /// Returns whether the lock was acquired.
    pub fn acquire(&self, timeout_ms: u32) -> bool {
        let deadline = deadline_after(timeout_ms);
        let mut locked = self.locked.lock();

        while *locked {
            match deadline {
                None => self.condvar.wait(&mut locked),
                Some(deadline) => {
                    if self.condvar.wait_until(&mut locked, deadline).timed_out() && *locked {
                        return false;
                    }
                }
            }
        }

        *locked = true;
        true
    }

    /// Acquires the lock only if it is free right now
    pub fn try_acquire(&self) -> bool {
        let mut locked = self.locked.lock();
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    /// Acquires the lock and returns a guard releasing it on drop
    pub fn guard(&self, timeout_ms: u32) -> Option<TimedLockGuard<'_>> {
        self.acquire(timeout_ms)
            .then_some(TimedLockGuard { lock: self })
    }

    pub fn release(&self) {
        let mut locked = self.locked.lock();
        if !*locked {
            warn!("TimedLock: release called on a lock that is not held");
        }
        *locked = false;
        self.condvar.notify_one();
    }

    pub fn is_locked(&self) -> bool {
        *self.locked.lock()
    }
}

impl Default for TimedLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TimedLockGuard<'a> {
    lock: &'a TimedLock,
}

impl Drop for TimedLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
