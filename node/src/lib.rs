//! # Lattice Node
//! A cluster node that connects to its peers over TCP or pipes, and keeps
//! versioned distributed objects consistent between a master instance and
//! the slave instances mapped by other nodes.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use lattice_shared::{
        ChangeType, ConnectionConfig, ConnectionDescription, ConnectionType, DataIStream,
        DataOStream, Distributable, NodeId, ObjectId, Serde, SerdeErr, SyncTarget, Version,
        TIMEOUT_INDEFINITE,
    };
}

mod barrier;
mod error;
mod local_node;
mod object;
mod packets;
mod peer;

pub use barrier::net_barrier::NetBarrier;
pub use error::NodeError;
pub use local_node::{local_node::LocalNode, node_config::NodeConfig};
pub use object::{object::Object, push::PushEvent};
pub use peer::Peer;
