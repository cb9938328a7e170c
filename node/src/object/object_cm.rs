use std::sync::Arc;

use lattice_shared::{Handler, NodeId, ObjectId, Version};

use crate::{error::NodeError, peer::Peer};

/// The change manager of one object instance registered with a node.
///
/// The node keeps one per object id and routes every object command
/// addressed to that id to it.
pub(crate) trait ObjectCm: Handler<Arc<Peer>> {
    fn object_id(&self) -> ObjectId;

    fn is_master(&self) -> bool;

    /// Master side of a map request: records `peer` as a slave and sends it
    /// the instance at `version` (head if None) plus any newer versions.
    /// Returns the version the slave starts at.
    fn add_slave(&self, peer: &Arc<Peer>, version: Option<Version>) -> Result<Version, NodeError>;

    /// Drops `node_id` as a slave
    fn remove_slave(&self, node_id: &NodeId);

    /// `node_id` disconnected. Masters drop it as a slave, slaves of it
    /// detach.
    fn peer_lost(&self, node_id: &NodeId);
}
