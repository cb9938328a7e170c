use std::collections::HashMap;

use log::warn;
use parking_lot::{Condvar, Mutex};

use super::{deadline_after, error::SyncError};

struct BarrierState {
    expected: usize,
    // tickets of the callers waiting in the open round, in arrival order
    waiting: Vec<u64>,
    next_ticket: u64,
    // ranks of released callers that have not woken up yet
    released: HashMap<u64, usize>,
}

/// A rendezvous point for threads within one process.
///
/// Each participant calls [`Barrier::enter`] with the number of participants
/// expected for the current round. All callers block until that many have
/// entered, then all are released together. Ranks are handed out on release
/// in arrival order, so exactly one caller of each round receives rank 0
/// even when earlier callers timed out and withdrew.
pub struct Barrier {
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

impl Barrier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState {
                expected: 0,
                waiting: Vec::new(),
                next_ticket: 0,
                released: HashMap::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `expected` participants have entered. Returns this
    /// caller's arrival rank within the round.
    pub fn enter(&self, expected: usize) -> usize {
        match self.enter_inner(expected, super::TIMEOUT_INDEFINITE) {
            Ok(rank) => rank,
            Err(_) => unreachable!("an indefinite barrier wait cannot time out"),
        }
    }

    /// Like [`Barrier::enter`], but gives up after `timeout_ms` and withdraws
    /// from the round.
    pub fn timed_enter(&self, expected: usize, timeout_ms: u32) -> Result<usize, SyncError> {
        self.enter_inner(expected, timeout_ms)
    }

    /// Number of participants currently waiting in the open round
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    fn enter_inner(&self, expected: usize, timeout_ms: u32) -> Result<usize, SyncError> {
        if expected <= 1 {
            return Ok(0);
        }

        let deadline = deadline_after(timeout_ms);
        let mut state = self.state.lock();

        if state.waiting.is_empty() {
            state.expected = expected;
        } else if state.expected != expected {
            warn!(
                "Barrier: entered with height {} while the open round expects {}",
                expected, state.expected
            );
        }

        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);
        state.waiting.push(ticket);

        if state.waiting.len() >= state.expected {
            let round = std::mem::take(&mut state.waiting);
            let last = round.len() - 1;
            for (rank, waiter) in round.into_iter().enumerate().take(last) {
                state.released.insert(waiter, rank);
            }
            self.condvar.notify_all();
            return Ok(last);
        }

        loop {
            if let Some(rank) = state.released.remove(&ticket) {
                return Ok(rank);
            }
            match deadline {
                None => self.condvar.wait(&mut state),
                Some(deadline) => {
                    if !self.condvar.wait_until(&mut state, deadline).timed_out() {
                        continue;
                    }
                    if let Some(rank) = state.released.remove(&ticket) {
                        return Ok(rank);
                    }
                    let arrived = state.waiting.len();
                    state.waiting.retain(|waiter| *waiter != ticket);
                    return Err(SyncError::BarrierTimeout {
                        expected: state.expected,
                        arrived,
                        timeout_ms,
                    });
                }
            }
        }
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}
