use std::sync::Arc;

use log::trace;

use lattice_shared::{Command, Connection, ConnectionDescription, NodeId};

use crate::error::NodeError;

/// A remote node this node holds a connection to
pub struct Peer {
    node_id: NodeId,
    connection: Arc<dyn Connection>,
    listen: Vec<ConnectionDescription>,
}

impl Peer {
    pub(crate) fn new(
        node_id: NodeId,
        connection: Arc<dyn Connection>,
        listen: Vec<ConnectionDescription>,
    ) -> Self {
        Self {
            node_id,
            connection,
            listen,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The endpoints the peer said it accepts connections on
    pub fn listen_descriptions(&self) -> &[ConnectionDescription] {
        &self.listen
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub(crate) fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub(crate) fn send(&self, command: &Command) -> Result<(), NodeError> {
        trace!("Peer: sending {} to {}", command.kind(), self.node_id);
        command.write_to(self.connection.as_ref())?;
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.connection.close();
    }
}
