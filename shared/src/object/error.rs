use thiserror::Error;

use crate::ids::{NodeId, ObjectId};

/// Errors raised by the object version state machines
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// The version counter would wrap
    #[error("Version {version} cannot be incremented without wrapping")]
    VersionOverflow { version: u64 },

    /// Static objects never change after registration
    #[error("Object {object_id} is static and cannot be committed")]
    StaticObject { object_id: ObjectId },

    /// A command referred to a slave the master does not know
    #[error("Node {node_id} is not a slave of object {object_id}")]
    UnknownSlave { object_id: ObjectId, node_id: NodeId },

    /// A slave delta arrived out of sequence
    #[error("Slave delta {received} from node {node_id} arrived, expected {expected}")]
    SlaveDeltaOutOfOrder {
        node_id: NodeId,
        expected: u32,
        received: u32,
    },
}
