use thiserror::Error;

use lattice_shared::{
    CommandError, ConnectionError, NodeId, ObjectError, ObjectId, RequestError, SerdeErr, Version,
};

/// Errors returned by [`LocalNode`](crate::LocalNode) and the handles it
/// hands out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Could not decode object data: {0}")]
    Serde(#[from] SerdeErr),

    /// The node was closed
    #[error("LocalNode is closed")]
    Closed,

    /// A node thread could not be started
    #[error("Could not spawn {name} thread: {message}")]
    ThreadSpawn { name: &'static str, message: String },

    /// The connect handshake with a peer failed
    #[error("Handshake failed: {reason}")]
    HandshakeFailed { reason: &'static str },

    /// A connection to this node already exists
    #[error("Already connected to node {node_id}")]
    AlreadyConnected { node_id: NodeId },

    #[error("Node {node_id} is not connected")]
    UnknownPeer { node_id: NodeId },

    /// No connected node is master of the object
    #[error("No connected node is master of object {object_id}")]
    MasterNotFound { object_id: ObjectId },

    /// The master refused or could not serve a map request
    #[error("Node {node_id} could not map object {object_id}")]
    MapFailed { object_id: ObjectId, node_id: NodeId },

    /// This node already holds an instance of the object
    #[error("Object {object_id} is already registered or mapped on this node")]
    AlreadyMapped { object_id: ObjectId },

    /// The operation requires the master instance
    #[error("Object {object_id} is not the master instance")]
    NotMaster { object_id: ObjectId },

    /// The operation requires a slave instance
    #[error("Object {object_id} is not a slave instance")]
    NotSlave { object_id: ObjectId },

    /// The object is no longer attached to its master
    #[error("Object {object_id} is detached")]
    Detached { object_id: ObjectId },

    /// The version a sync waited for did not arrive in time
    #[error("Timed out waiting for object {object_id} to reach {version}")]
    SyncTimeout { object_id: ObjectId, version: Version },

    /// Not all participants entered a distributed barrier in time
    #[error("Barrier {barrier_id} timed out in round {round} after {timeout_ms}ms")]
    BarrierTimeout {
        barrier_id: ObjectId,
        round: u32,
        timeout_ms: u32,
    },
}
