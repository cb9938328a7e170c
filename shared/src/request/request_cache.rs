use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::ids::NodeId;

use super::error::RequestError;

struct PendingRequest<T> {
    peer: Option<NodeId>,
    reply: Option<Result<T, RequestError>>,
}

struct RequestState<T> {
    next_id: u32,
    pending: HashMap<u32, PendingRequest<T>>,
}

/// Matches replies arriving on receiver threads with the application threads
/// waiting for them.
///
/// A request is registered before its command is sent, the receiver thread
/// serves the reply under the same id, and the requesting thread waits for
/// it with a timeout.
pub struct RequestCache<T> {
    state: Mutex<RequestState<T>>,
    served: Condvar,
}

impl<T> RequestCache<T> {
    /// Ids start at `first_id`, so that ids from different nodes are
    /// unlikely to be confused in logs
    pub fn new(first_id: u32) -> Self {
        Self {
            state: Mutex::new(RequestState {
                next_id: first_id,
                pending: HashMap::new(),
            }),
            served: Condvar::new(),
        }
    }

    /// Registers a new request, optionally bound to the peer expected to
    /// reply, and returns its id
    pub fn register(&self, peer: Option<NodeId>) -> u32 {
        let mut state = self.state.lock();
        let mut request_id = state.next_id;
        while state.pending.contains_key(&request_id) {
            request_id = request_id.wrapping_add(1);
        }
        state.next_id = request_id.wrapping_add(1);
        state.pending.insert(request_id, PendingRequest { peer, reply: None });
        request_id
    }

    /// Stores the reply for `request_id`. Returns false if nobody waits for
    /// it anymore or it was already served.
    pub fn serve(&self, request_id: u32, reply: T) -> bool {
        let mut state = self.state.lock();
        match state.pending.get_mut(&request_id) {
            Some(request) if request.reply.is_none() => {
                request.reply = Some(Ok(reply));
                self.served.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Fails every unserved request bound to `node_id`. Returns how many
    /// requests were failed.
    pub fn fail_peer(&self, node_id: NodeId) -> usize {
        let mut state = self.state.lock();
        let mut failed = 0;
        for (request_id, request) in state.pending.iter_mut() {
            if request.peer == Some(node_id) && request.reply.is_none() {
                request.reply = Some(Err(RequestError::PeerLost {
                    request_id: *request_id,
                    node_id,
                }));
                failed += 1;
            }
        }
        if failed > 0 {
            self.served.notify_all();
        }
        failed
    }

    /// Blocks until `request_id` is served or `timeout` elapses. The request
    /// is forgotten either way.
    pub fn wait(&self, request_id: u32, timeout: Duration) -> Result<T, RequestError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let served = match state.pending.get(&request_id) {
                Some(request) => request.reply.is_some(),
                None => return Err(RequestError::Unknown { request_id }),
            };
            if served {
                break;
            }
            if self.served.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        match state.pending.remove(&request_id) {
            Some(PendingRequest {
                reply: Some(reply), ..
            }) => reply,
            Some(_) => Err(RequestError::TimedOut { request_id }),
            None => Err(RequestError::Unknown { request_id }),
        }
    }

    /// Drops an unserved request without waiting for it
    pub fn cancel(&self, request_id: u32) -> bool {
        self.state.lock().pending.remove(&request_id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}
