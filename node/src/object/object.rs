use std::sync::Arc;

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use lattice_shared::{Distributable, NodeId, ObjectCommand, ObjectId, SyncTarget, Version};

use crate::{
    error::NodeError, local_node::node_inner::NodeInner, object::object_instance::ObjectInstance,
    object::object_cm::ObjectCm, packets,
};

/// Handle to a distributed object registered with, or mapped by, a
/// [`LocalNode`](crate::LocalNode).
///
/// The master instance publishes versions with [`Object::commit`]. Slaves
/// receive them in the background and make them visible with
/// [`Object::sync`]. Release the handle with
/// [`LocalNode::unregister_object`](crate::LocalNode::unregister_object) or
/// [`LocalNode::unmap_object`](crate::LocalNode::unmap_object).
pub struct Object<T: Distributable> {
    instance: Arc<ObjectInstance<T>>,
    node: Arc<NodeInner>,
}

impl<T: Distributable> Object<T> {
    pub(crate) fn new(instance: Arc<ObjectInstance<T>>, node: Arc<NodeInner>) -> Self {
        Self { instance, node }
    }

    pub(crate) fn instance(&self) -> &Arc<ObjectInstance<T>> {
        &self.instance
    }

    pub fn id(&self) -> ObjectId {
        self.instance.object_id()
    }

    /// The version currently visible to the application
    pub fn version(&self) -> Version {
        self.instance.version()
    }

    /// The newest version received. Equal to `version` on a master.
    pub fn head_version(&self) -> Version {
        self.instance.head_version()
    }

    pub fn is_master(&self) -> bool {
        self.instance.is_master()
    }

    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.instance.data().read()
    }

    /// Mutable access to the data. Changes reach other nodes on the next
    /// commit.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.instance.data().write()
    }

    /// Publishes the current changes and returns the resulting version. On
    /// a slave the changes go to the master, which applies them on its next
    /// sync.
    pub fn commit(&self) -> Result<Version, NodeError> {
        self.instance.commit()
    }

    /// Makes received versions visible. `Next` and `Version` wait up to the
    /// node's request timeout. A slave that fails to apply a version keeps
    /// its current one and asks the master for a fresh instance.
    ///
    /// On a master this applies the changes slaves committed, each as a new
    /// version sent on to every slave.
    pub fn sync(&self, target: SyncTarget) -> Result<Version, NodeError> {
        self.instance
            .sync(target, self.node.config().request_timeout)
    }

    /// Sends the current instance data to `nodes`, outside of the commit
    /// cycle. Slaves on those nodes replace their state with it, other
    /// nodes hand it to their push handler.
    pub fn push(&self, group: u128, type_id: u128, nodes: &[NodeId]) -> Result<(), NodeError> {
        let command = packets::command(
            ObjectCommand::Push,
            self.id().as_u128(),
            &self.instance.push_payload(group, type_id),
        );

        let mut result = Ok(());
        for node_id in nodes {
            let sent = match self.node.peer(node_id) {
                Some(peer) => peer.send(&command),
                None => Err(NodeError::UnknownPeer { node_id: *node_id }),
            };
            if let Err(error) = sent {
                warn!("Object: push of {} to {} failed: {}", self.id(), node_id, error);
                result = Err(error);
            }
        }
        result
    }

    /// Number of committed versions kept before head, see
    /// [`NodeConfig::auto_obsolete`](crate::NodeConfig::auto_obsolete)
    pub fn set_auto_obsolete(&self, count: u32) -> Result<(), NodeError> {
        self.instance.set_auto_obsolete(count)
    }
}
