use thiserror::Error;

use crate::ids::NodeId;

/// Reasons a pending request produced no reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No reply arrived before the timeout elapsed
    #[error("Request {request_id} timed out")]
    TimedOut { request_id: u32 },

    /// The request id was never registered, or was already waited for
    #[error("Request {request_id} is unknown")]
    Unknown { request_id: u32 },

    /// The node that was expected to reply went away
    #[error("Request {request_id} failed, node {node_id} disconnected")]
    PeerLost { request_id: u32, node_id: NodeId },
}
