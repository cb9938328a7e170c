use std::sync::Arc;

use log::info;

use lattice_shared::{
    create_connection_with_config, ConnectionDescription, ConnectionType, Distributable, NodeId,
    ObjectId, SyncTarget, Version,
};

use crate::{
    barrier::{barrier_cm::BarrierCm, net_barrier::NetBarrier},
    error::NodeError,
    local_node::{node_config::NodeConfig, node_inner::NodeInner},
    object::{object::Object, object_instance::ObjectInstance, push::PushEvent},
    peer::Peer,
};

/// A process's membership in a cluster.
///
/// A LocalNode accepts peers on the endpoints in its [`NodeConfig`],
/// connects to other nodes, and hosts the distributed objects registered
/// with or mapped by it. Each peer connection is served by its own receiver
/// thread. Dropping the node closes it.
pub struct LocalNode {
    inner: Arc<NodeInner>,
}

impl LocalNode {
    /// Create a new LocalNode. Call [`LocalNode::listen`] to accept peers.
    pub fn new(config: NodeConfig) -> Self {
        let inner = NodeInner::new(config);
        info!("LocalNode: created {}", inner.node_id());
        Self { inner }
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.node_id()
    }

    pub fn config(&self) -> &NodeConfig {
        self.inner.config()
    }

    /// Binds every endpoint in the config and starts accepting peers
    pub fn listen(&self) -> Result<(), NodeError> {
        if self.inner.is_closed() {
            return Err(NodeError::Closed);
        }
        for description in &self.inner.config().listen {
            let listener = create_connection_with_config(
                description.connection_type,
                self.inner.config().connection.clone(),
            )?;
            listener.listen(description)?;
            info!(
                "LocalNode: {} listening on {}",
                self.node_id(),
                listener.description()
            );
            self.inner.start_listener(listener)?;
        }
        Ok(())
    }

    /// The endpoints this node is listening on, with the ports actually bound
    pub fn listen_descriptions(&self) -> Vec<ConnectionDescription> {
        self.inner.listen_descriptions()
    }

    /// Connects to the node listening at `description`
    pub fn connect(&self, description: &ConnectionDescription) -> Result<Arc<Peer>, NodeError> {
        if self.inner.is_closed() {
            return Err(NodeError::Closed);
        }
        let connection = create_connection_with_config(
            description.connection_type,
            self.inner.config().connection.clone(),
        )?;
        connection.connect(description)?;
        self.inner.initiate(connection, vec![description.clone()])
    }

    /// Connects to another node in this process over an anonymous pipe
    pub fn connect_local(&self, other: &LocalNode) -> Result<Arc<Peer>, NodeError> {
        if self.inner.is_closed() || other.inner.is_closed() {
            return Err(NodeError::Closed);
        }
        let connection = create_connection_with_config(
            ConnectionType::Pipe,
            self.inner.config().connection.clone(),
        )?;
        connection.connect(&ConnectionDescription::pipe())?;
        other.inner.serve(connection.accept()?);
        self.inner.initiate(connection, Vec::new())
    }

    pub fn disconnect(&self, node_id: &NodeId) -> Result<(), NodeError> {
        self.inner.disconnect(node_id)
    }

    /// Disconnects every peer, stops listening and joins the node's threads.
    /// Object handles still held become unusable.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn peer(&self, node_id: &NodeId) -> Option<Arc<Peer>> {
        self.inner.peer(node_id)
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.inner.peers()
    }

    // Objects

    /// Registers `data` as the master instance of a new distributed object
    pub fn register_object<T: Distributable>(&self, data: T) -> Result<Object<T>, NodeError> {
        if self.inner.is_closed() {
            return Err(NodeError::Closed);
        }
        let object_id = ObjectId::new();
        let instance = Arc::new(ObjectInstance::new_master(
            object_id,
            data,
            self.inner.config().auto_obsolete,
        ));
        self.inner.insert_object(instance.clone())?;
        info!("LocalNode: {} registered {}", self.node_id(), object_id);
        Ok(Object::new(instance, self.inner.clone()))
    }

    /// Maps the head version of `object_id` into `data`, asking connected
    /// peers which of them holds the master
    pub fn map_object<T: Distributable>(&self, object_id: ObjectId, data: T) -> Result<Object<T>, NodeError> {
        let master = self.inner.find_master(object_id)?;
        self.map_from(&master, object_id, None, data)
    }

    /// Maps the head version of `object_id` from the master on `node_id`
    pub fn map_object_from<T: Distributable>(
        &self,
        node_id: &NodeId,
        object_id: ObjectId,
        data: T,
    ) -> Result<Object<T>, NodeError> {
        let master = self
            .inner
            .peer(node_id)
            .ok_or(NodeError::UnknownPeer { node_id: *node_id })?;
        self.map_from(&master, object_id, None, data)
    }

    /// Maps `object_id` at `version`, or at the oldest version its master
    /// still retains. Newer versions are queued and applied by
    /// [`Object::sync`].
    pub fn map_object_at<T: Distributable>(
        &self,
        object_id: ObjectId,
        version: Version,
        data: T,
    ) -> Result<Object<T>, NodeError> {
        let master = self.inner.find_master(object_id)?;
        self.map_from(&master, object_id, Some(version), data)
    }

    fn map_from<T: Distributable>(
        &self,
        master: &Arc<Peer>,
        object_id: ObjectId,
        version: Option<Version>,
        data: T,
    ) -> Result<Object<T>, NodeError> {
        let instance = Arc::new(ObjectInstance::new_slave(object_id, data, master.clone()));
        self.inner.map(master, instance.clone(), version)?;

        // the instance data arrived ahead of the map reply
        if let Err(error) = instance.sync(SyncTarget::Next, self.inner.config().request_timeout) {
            self.inner.remove_object(&object_id);
            return Err(error);
        }
        Ok(Object::new(instance, self.inner.clone()))
    }

    /// Unregisters a master instance. Slaves that mapped it are detached
    /// once they acknowledged its head version, or after the request
    /// timeout.
    pub fn unregister_object<T: Distributable>(&self, object: &Object<T>) -> Result<(), NodeError> {
        object
            .instance()
            .unregister(self.inner.config().request_timeout)?;
        self.inner.remove_object(&object.id());
        Ok(())
    }

    /// Unmaps a slave instance, after its outstanding commits were
    /// acknowledged by the master
    pub fn unmap_object<T: Distributable>(&self, object: &Object<T>) -> Result<(), NodeError> {
        object
            .instance()
            .unmap(self.inner.config().request_timeout)?;
        self.inner.remove_object(&object.id());
        info!("LocalNode: {} unmapped {}", self.node_id(), object.id());
        Ok(())
    }

    /// Sets the function receiving pushes for objects this node holds no
    /// instance of
    pub fn set_push_handler<F>(&self, handler: F)
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        self.inner.set_push_handler(Some(Arc::new(handler)));
    }

    pub fn clear_push_handler(&self) {
        self.inner.set_push_handler(None);
    }

    // Barriers

    /// Creates a barrier released whenever `height` participants entered it
    pub fn create_barrier(&self, height: u32) -> Result<NetBarrier, NodeError> {
        if self.inner.is_closed() {
            return Err(NodeError::Closed);
        }
        let barrier = Arc::new(BarrierCm::new_master(ObjectId::new(), height));
        self.inner.insert_object(barrier.clone())?;
        Ok(NetBarrier::new(barrier, self.inner.clone()))
    }

    /// Joins the barrier `barrier_id` created on a connected node
    pub fn map_barrier(&self, barrier_id: ObjectId) -> Result<NetBarrier, NodeError> {
        let master = self.inner.find_master(barrier_id)?;
        let barrier = Arc::new(BarrierCm::new_slave(barrier_id, master.clone()));
        self.inner.map(&master, barrier.clone(), None)?;
        Ok(NetBarrier::new(barrier, self.inner.clone()))
    }
}

impl Drop for LocalNode {
    fn drop(&mut self) {
        self.inner.close();
    }
}
