use std::{ops::Add, time::Instant};

use parking_lot::{Condvar, Mutex};

use super::deadline_after;

/// A value guarded by a mutex, with waiters woken on every change.
///
/// Used to block a thread until a counter or state variable reaches a given
/// value, e.g. until a barrier has been left or a request has been served.
pub struct Monitor<T> {
    value: Mutex<T>,
    condvar: Condvar,
}

impl<T: Copy + PartialOrd> Monitor<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    pub fn get(&self) -> T {
        *self.value.lock()
    }

    pub fn set(&self, value: T) {
        let mut guard = self.value.lock();
        *guard = value;
        self.condvar.notify_all();
    }

    /// Mutates the value in place and wakes all waiters. Returns the new value.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) -> T {
        let mut guard = self.value.lock();
        f(&mut guard);
        self.condvar.notify_all();
        *guard
    }

    /// Blocks until the value equals `value`
    pub fn wait_eq(&self, value: T) -> T {
        self.wait_until(|current| *current == value, None)
            .unwrap_or(value)
    }

    /// Blocks until the value equals `value` or the timeout elapses. Returns
    /// whether the value was reached.
    pub fn timed_wait_eq(&self, value: T, timeout_ms: u32) -> bool {
        self.wait_until(|current| *current == value, deadline_after(timeout_ms))
            .is_some()
    }

    /// Blocks until the value is greater than or equal to `value`
    pub fn wait_ge(&self, value: T) -> T {
        self.wait_until(|current| *current >= value, None)
            .unwrap_or(value)
    }

    pub fn timed_wait_ge(&self, value: T, timeout_ms: u32) -> bool {
        self.wait_until(|current| *current >= value, deadline_after(timeout_ms))
            .is_some()
    }

    fn wait_until<P: Fn(&T) -> bool>(&self, predicate: P, deadline: Option<Instant>) -> Option<T> {
        let mut guard = self.value.lock();
        while !predicate(&*guard) {
            match deadline {
                None => self.condvar.wait(&mut guard),
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        return predicate(&*guard).then_some(*guard);
                    }
                }
            }
        }
        Some(*guard)
    }
}

impl<T: Copy + PartialOrd + Add<Output = T> + From<u8>> Monitor<T> {
    /// Adds one to the value and wakes all waiters. Returns the new value.
    pub fn increment(&self) -> T {
        self.update(|value| *value = *value + T::from(1))
    }
}
