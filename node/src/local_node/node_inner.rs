use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info, trace, warn};
use parking_lot::{Mutex, RwLock};

use lattice_shared::{
    Command, CommandError, CommandKind, CommandResult, Connection, ConnectionDescription,
    ConnectionError, Dispatcher, NodeCommand, NodeId, ObjectCommand, ObjectId, RequestCache,
    Version,
};

use crate::{
    error::NodeError,
    local_node::node_config::NodeConfig,
    object::{
        object_cm::ObjectCm,
        push::{PushEvent, PushHandler},
    },
    packets::{
        self, ConnectPayload, ConnectReplyPayload, FindMasterPayload, FindMasterReplyPayload,
        MapObjectPayload, MapObjectReplyPayload, PushPayload, UnmapObjectPayload,
    },
    peer::Peer,
};

/// Replies to the requests a node sends its peers
pub(crate) enum Reply {
    FindMaster(bool),
    MapObject(Option<Version>),
}

/// State shared between a [`LocalNode`](crate::LocalNode), the handles it
/// hands out and its listener and receiver threads
pub(crate) struct NodeInner {
    node_id: NodeId,
    config: NodeConfig,
    closed: AtomicBool,
    listeners: Mutex<Vec<Arc<dyn Connection>>>,
    /// Accepted connections still in their handshake
    incoming: Mutex<Vec<Arc<dyn Connection>>>,
    peers: RwLock<HashMap<NodeId, Arc<Peer>>>,
    objects: RwLock<HashMap<ObjectId, Arc<dyn ObjectCm>>>,
    requests: RequestCache<Reply>,
    dispatcher: Dispatcher<Arc<Peer>>,
    push_handler: RwLock<Option<Arc<PushHandler>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

type NodeHandlerFn = fn(&NodeInner, &Arc<Peer>, &Command) -> Result<CommandResult, NodeError>;

impl NodeInner {
    pub fn new(config: NodeConfig) -> Arc<Self> {
        Arc::new_cyclic(|node| Self {
            node_id: NodeId::new(),
            config,
            closed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            incoming: Mutex::new(Vec::new()),
            peers: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            requests: RequestCache::new(fastrand::u32(..)),
            dispatcher: Self::dispatcher(node),
            push_handler: RwLock::new(None),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Connect and ConnectReply stay unregistered, they are only legal
    /// during the handshake.
    fn dispatcher(node: &Weak<NodeInner>) -> Dispatcher<Arc<Peer>> {
        let mut dispatcher = Dispatcher::new();
        let node_handlers: [(NodeCommand, NodeHandlerFn); 6] = [
            (NodeCommand::Disconnect, NodeInner::handle_disconnect),
            (NodeCommand::FindMaster, NodeInner::handle_find_master),
            (NodeCommand::FindMasterReply, NodeInner::handle_find_master_reply),
            (NodeCommand::MapObject, NodeInner::handle_map_object),
            (NodeCommand::MapObjectReply, NodeInner::handle_map_object_reply),
            (NodeCommand::UnmapObject, NodeInner::handle_unmap_object),
        ];
        for (kind, handler) in node_handlers {
            dispatcher.register(kind, Self::handler(node, handler));
        }
        for kind in ObjectCommand::ALL {
            dispatcher.register(kind, Self::handler(node, NodeInner::route_object_command));
        }
        dispatcher
    }

    fn handler(
        node: &Weak<NodeInner>,
        handle: NodeHandlerFn,
    ) -> impl Fn(&Arc<Peer>, &Command) -> CommandResult + Send + Sync + 'static {
        let node = node.clone();
        move |peer: &Arc<Peer>, command: &Command| {
            let Some(node) = node.upgrade() else {
                return CommandResult::Discard;
            };
            handle(&node, peer, command).unwrap_or_else(|error| {
                warn!(
                    "LocalNode: failed to handle {} from {}: {}",
                    command.kind(),
                    peer.node_id(),
                    error
                );
                CommandResult::Error
            })
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn peer(&self, node_id: &NodeId) -> Option<Arc<Peer>> {
        self.peers.read().get(node_id).cloned()
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    pub fn listen_descriptions(&self) -> Vec<ConnectionDescription> {
        self.listeners
            .lock()
            .iter()
            .map(|listener| listener.description())
            .collect()
    }

    pub fn set_push_handler(&self, handler: Option<Arc<PushHandler>>) {
        *self.push_handler.write() = handler;
    }

    // Threads

    fn spawn<F>(&self, name: &'static str, f: F) -> Result<(), NodeError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(NodeError::Closed);
        }
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|error| NodeError::ThreadSpawn {
                name,
                message: error.to_string(),
            })?;

        let mut threads = self.threads.lock();
        threads.retain(|thread| !thread.is_finished());
        threads.push(handle);
        Ok(())
    }

    /// Starts accepting peers on `listener`, which must be listening
    pub fn start_listener(self: &Arc<Self>, listener: Arc<dyn Connection>) -> Result<(), NodeError> {
        self.listeners.lock().push(listener.clone());
        let node = self.clone();
        self.spawn("lattice-listener", move || node.accept_loop(listener))
    }

    fn accept_loop(self: Arc<Self>, listener: Arc<dyn Connection>) {
        loop {
            let connection = match listener.accept() {
                Ok(connection) => connection,
                Err(ConnectionError::Closed) => break,
                Err(error) => {
                    if !self.is_closed() {
                        error!("LocalNode: listener {} failed: {}", listener.description(), error);
                    }
                    break;
                }
            };
            self.serve(connection);
        }
        debug!("LocalNode: listener {} stopped", listener.description());
    }

    /// Answers the handshake of an incoming connection on its own thread,
    /// which then becomes the peer's receiver
    pub fn serve(self: &Arc<Self>, connection: Arc<dyn Connection>) {
        self.incoming.lock().push(connection.clone());
        let node = self.clone();
        let spawned = self.spawn("lattice-receiver", move || {
            let answered = node.answer(connection.clone());
            node.incoming
                .lock()
                .retain(|pending| !Arc::ptr_eq(pending, &connection));
            match answered {
                Ok(peer) => node.receive(peer),
                Err(error) => warn!("LocalNode: rejected incoming connection: {}", error),
            }
        });
        if let Err(error) = spawned {
            debug!("LocalNode: dropping incoming connection: {}", error);
        }
    }

    // Handshake

    fn answer(&self, connection: Arc<dyn Connection>) -> Result<Arc<Peer>, NodeError> {
        let command = Command::read_from(connection.as_ref())?;
        if command.kind() != CommandKind::Node(NodeCommand::Connect) {
            connection.close();
            return Err(NodeError::HandshakeFailed {
                reason: "first command was not Connect",
            });
        }
        let payload: ConnectPayload = packets::read(&command)?;
        let node_id = NodeId::from_u128(command.target());
        let listen = ConnectionDescription::parse_list(&payload.listen)?;

        let mut peers = self.peers.write();
        let accepted = node_id != self.node_id && !peers.contains_key(&node_id) && !self.is_closed();
        let peer = Arc::new(Peer::new(node_id, connection.clone(), listen));
        if accepted {
            peers.insert(node_id, peer.clone());
        }
        drop(peers);

        let reply = packets::command(
            NodeCommand::ConnectReply,
            self.node_id.as_u128(),
            &ConnectReplyPayload { accepted },
        );
        if let Err(error) = reply.write_to(connection.as_ref()) {
            if accepted {
                self.remove_peer(&peer);
            }
            connection.close();
            return Err(error.into());
        }
        if !accepted {
            connection.close();
            return Err(NodeError::AlreadyConnected { node_id });
        }
        info!("LocalNode: {} accepted peer {}", self.node_id, node_id);
        Ok(peer)
    }

    /// Runs the client side of the handshake on a connected `connection`
    pub fn initiate(
        self: &Arc<Self>,
        connection: Arc<dyn Connection>,
        remote: Vec<ConnectionDescription>,
    ) -> Result<Arc<Peer>, NodeError> {
        let result = self.handshake(connection.as_ref());
        let node_id = match result {
            Ok(node_id) => node_id,
            Err(error) => {
                connection.close();
                return Err(error);
            }
        };

        let peer = Arc::new(Peer::new(node_id, connection, remote));
        {
            let mut peers = self.peers.write();
            if peers.contains_key(&node_id) {
                drop(peers);
                peer.close();
                return Err(NodeError::AlreadyConnected { node_id });
            }
            peers.insert(node_id, peer.clone());
        }
        info!("LocalNode: {} connected to {}", self.node_id, node_id);

        let node = self.clone();
        let receiver = peer.clone();
        if let Err(error) = self.spawn("lattice-receiver", move || node.receive(receiver)) {
            self.remove_peer(&peer);
            peer.close();
            return Err(error);
        }
        Ok(peer)
    }

    fn handshake(&self, connection: &dyn Connection) -> Result<NodeId, NodeError> {
        let listen = ConnectionDescription::serialize_list(&self.listen_descriptions());
        packets::command(
            NodeCommand::Connect,
            self.node_id.as_u128(),
            &ConnectPayload { listen },
        )
        .write_to(connection)?;

        let reply = Command::read_from(connection)?;
        if reply.kind() != CommandKind::Node(NodeCommand::ConnectReply) {
            return Err(NodeError::HandshakeFailed {
                reason: "peer did not answer with ConnectReply",
            });
        }
        let payload: ConnectReplyPayload = packets::read(&reply)?;
        let node_id = NodeId::from_u128(reply.target());
        if !payload.accepted {
            return Err(NodeError::AlreadyConnected { node_id });
        }
        Ok(node_id)
    }

    // Receiving

    fn receive(&self, peer: Arc<Peer>) {
        loop {
            let command = match Command::read_from(peer.connection()) {
                Ok(command) => command,
                Err(CommandError::Connection(error)) => {
                    if !self.is_closed() {
                        info!("LocalNode: connection to {} ended: {}", peer.node_id(), error);
                    }
                    break;
                }
                Err(error) => {
                    error!("LocalNode: protocol error from {}: {}", peer.node_id(), error);
                    break;
                }
            };

            trace!("LocalNode: received {} from {}", command.kind(), peer.node_id());
            match self.dispatcher.dispatch(&peer, &command) {
                CommandResult::Handled => {}
                CommandResult::Discard => {
                    debug!("LocalNode: discarded {} from {}", command.kind(), peer.node_id())
                }
                CommandResult::Error => {
                    error!(
                        "LocalNode: closing connection to {} after failing {}",
                        peer.node_id(),
                        command.kind()
                    );
                    break;
                }
            }
        }

        peer.close();
        self.remove_peer(&peer);
    }

    /// Forgets `peer`: masters drop it as a slave, slaves of it detach, and
    /// requests waiting on it fail
    pub fn remove_peer(&self, peer: &Arc<Peer>) {
        let node_id = peer.node_id();
        {
            let mut peers = self.peers.write();
            if peers
                .get(&node_id)
                .map_or(false, |current| Arc::ptr_eq(current, peer))
            {
                peers.remove(&node_id);
            }
        }

        let objects: Vec<_> = self.objects.read().values().cloned().collect();
        for object in objects {
            object.peer_lost(&node_id);
        }
        let failed = self.requests.fail_peer(node_id);
        if failed > 0 {
            debug!("LocalNode: failed {} requests waiting on {}", failed, node_id);
        }
    }

    pub fn disconnect(&self, node_id: &NodeId) -> Result<(), NodeError> {
        let peer = self
            .peer(node_id)
            .ok_or(NodeError::UnknownPeer { node_id: *node_id })?;

        let disconnect = Command::new(NodeCommand::Disconnect, node_id.as_u128(), Vec::new());
        if let Err(error) = peer.send(&disconnect) {
            debug!("LocalNode: could not say goodbye to {}: {}", node_id, error);
        }
        peer.close();
        self.remove_peer(&peer);
        info!("LocalNode: {} disconnected from {}", self.node_id, node_id);
        Ok(())
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for listener in self.listeners.lock().drain(..) {
            listener.close();
        }
        for connection in self.incoming.lock().drain(..) {
            connection.close();
        }
        for peer in self.peers() {
            if let Err(error) = self.disconnect(&peer.node_id()) {
                debug!("LocalNode: {}", error);
            }
        }

        let current = thread::current().id();
        let threads = std::mem::take(&mut *self.threads.lock());
        for thread in threads {
            if thread.thread().id() == current {
                continue;
            }
            if thread.join().is_err() {
                warn!("LocalNode: a node thread panicked");
            }
        }
        info!("LocalNode: {} closed", self.node_id);
    }

    // Objects

    pub fn insert_object(&self, object: Arc<dyn ObjectCm>) -> Result<(), NodeError> {
        let object_id = object.object_id();
        let mut objects = self.objects.write();
        if objects.contains_key(&object_id) {
            return Err(NodeError::AlreadyMapped { object_id });
        }
        objects.insert(object_id, object);
        Ok(())
    }

    pub fn remove_object(&self, object_id: &ObjectId) {
        self.objects.write().remove(object_id);
    }

    fn object(&self, object_id: &ObjectId) -> Option<Arc<dyn ObjectCm>> {
        self.objects.read().get(object_id).cloned()
    }

    /// Asks every connected peer in turn whether it holds the master of
    /// `object_id`
    pub fn find_master(&self, object_id: ObjectId) -> Result<Arc<Peer>, NodeError> {
        for peer in self.peers() {
            let request_id = self.requests.register(Some(peer.node_id()));
            let request = packets::command(
                NodeCommand::FindMaster,
                peer.node_id().as_u128(),
                &FindMasterPayload {
                    request_id,
                    object_id,
                },
            );
            if let Err(error) = peer.send(&request) {
                self.requests.cancel(request_id);
                debug!("LocalNode: could not ask {} for {}: {}", peer.node_id(), object_id, error);
                continue;
            }

            match self.requests.wait(request_id, self.config.request_timeout) {
                Ok(Reply::FindMaster(true)) => return Ok(peer),
                Ok(_) => {}
                Err(error) => debug!("LocalNode: {}", error),
            }
        }
        Err(NodeError::MasterNotFound { object_id })
    }

    /// Maps `object` from `master`. The object is stored first, so the
    /// instance data sent ahead of the reply reaches it. Returns the
    /// version the master started the slave at.
    pub fn map(
        &self,
        master: &Arc<Peer>,
        object: Arc<dyn ObjectCm>,
        version: Option<Version>,
    ) -> Result<Version, NodeError> {
        let object_id = object.object_id();
        self.insert_object(object)?;

        let result = self.request_map(master, object_id, version);
        if result.is_err() {
            self.remove_object(&object_id);
        }
        result
    }

    fn request_map(
        &self,
        master: &Arc<Peer>,
        object_id: ObjectId,
        version: Option<Version>,
    ) -> Result<Version, NodeError> {
        let request_id = self.requests.register(Some(master.node_id()));
        let request = packets::command(
            NodeCommand::MapObject,
            master.node_id().as_u128(),
            &MapObjectPayload {
                request_id,
                object_id,
                version,
            },
        );
        if let Err(error) = master.send(&request) {
            self.requests.cancel(request_id);
            return Err(error);
        }

        match self.requests.wait(request_id, self.config.request_timeout)? {
            Reply::MapObject(Some(version)) => {
                info!("LocalNode: mapped {} from {} at {}", object_id, master.node_id(), version);
                Ok(version)
            }
            _ => Err(NodeError::MapFailed {
                object_id,
                node_id: master.node_id(),
            }),
        }
    }

    // Handlers

    fn handle_disconnect(&self, peer: &Arc<Peer>, _command: &Command) -> Result<CommandResult, NodeError> {
        info!("LocalNode: {} said goodbye", peer.node_id());
        peer.close();
        Ok(CommandResult::Handled)
    }

    fn handle_find_master(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: FindMasterPayload = packets::read(command)?;
        let is_master = self
            .object(&payload.object_id)
            .map_or(false, |object| object.is_master());

        peer.send(&packets::command(
            NodeCommand::FindMasterReply,
            peer.node_id().as_u128(),
            &FindMasterReplyPayload {
                request_id: payload.request_id,
                is_master,
            },
        ))?;
        Ok(CommandResult::Handled)
    }

    fn handle_find_master_reply(&self, _peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: FindMasterReplyPayload = packets::read(command)?;
        Ok(self.serve_request(payload.request_id, Reply::FindMaster(payload.is_master)))
    }

    fn handle_map_object(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: MapObjectPayload = packets::read(command)?;
        let version = match self.object(&payload.object_id) {
            Some(object) if object.is_master() => match object.add_slave(peer, payload.version) {
                Ok(version) => Some(version),
                Err(error) => {
                    warn!("LocalNode: {} could not map {}: {}", peer.node_id(), payload.object_id, error);
                    None
                }
            },
            _ => {
                warn!(
                    "LocalNode: {} asked to map {}, which has no master here",
                    peer.node_id(),
                    payload.object_id
                );
                None
            }
        };

        peer.send(&packets::command(
            NodeCommand::MapObjectReply,
            peer.node_id().as_u128(),
            &MapObjectReplyPayload {
                request_id: payload.request_id,
                version,
            },
        ))?;
        Ok(CommandResult::Handled)
    }

    fn handle_map_object_reply(&self, _peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: MapObjectReplyPayload = packets::read(command)?;
        Ok(self.serve_request(payload.request_id, Reply::MapObject(payload.version)))
    }

    fn handle_unmap_object(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: UnmapObjectPayload = packets::read(command)?;
        match self.object(&payload.object_id) {
            Some(object) => {
                object.remove_slave(&peer.node_id());
                info!("LocalNode: {} unmapped {}", peer.node_id(), payload.object_id);
                Ok(CommandResult::Handled)
            }
            None => Ok(CommandResult::Discard),
        }
    }

    fn route_object_command(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let object_id = ObjectId::from_u128(command.target());
        if let Some(object) = self.object(&object_id) {
            return Ok(object.dispatch(peer, command));
        }
        if command.kind() != CommandKind::Object(ObjectCommand::Push) {
            return Ok(CommandResult::Discard);
        }

        let Some(handler) = self.push_handler.read().clone() else {
            return Ok(CommandResult::Discard);
        };
        let payload: PushPayload = packets::read(command)?;
        handler(&PushEvent {
            origin: peer.node_id(),
            object_id,
            group: payload.group,
            type_id: payload.type_id,
            version: payload.version,
            data: payload.data,
        });
        Ok(CommandResult::Handled)
    }

    fn serve_request(&self, request_id: u32, reply: Reply) -> CommandResult {
        if self.requests.serve(request_id, reply) {
            CommandResult::Handled
        } else {
            CommandResult::Discard
        }
    }
}
