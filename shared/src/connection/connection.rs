use std::sync::Arc;

use super::{
    connection_config::ConnectionConfig, connection_description::ConnectionDescription,
    connection_type::ConnectionType, error::ConnectionError,
    socket_connection::SocketConnection,
};

/// The lifecycle state of a [`Connection`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Listening,
    Connected,
}

/// A reliable, ordered byte channel between two nodes.
///
/// A Connection is either the connecting side of a link, or a listener
/// which hands out one new Connection per accepted peer. Sends and receives
/// transfer the full buffer or fail; a failure closes the connection.
/// Closing is idempotent and unblocks any thread waiting in `recv` or
/// `accept`.
pub trait Connection: Send + Sync {
    fn connection_type(&self) -> ConnectionType;

    fn state(&self) -> ConnectionState;

    /// The description this connection was connected or bound with. For a
    /// listener bound to port 0 this carries the port actually chosen.
    fn description(&self) -> ConnectionDescription;

    /// Printable address of the remote end, if connected
    fn peer_address(&self) -> Option<String>;

    /// Connects to the peer described by `description`
    fn connect(&self, description: &ConnectionDescription) -> Result<(), ConnectionError>;

    /// Starts accepting peers at the address described by `description`
    fn listen(&self, description: &ConnectionDescription) -> Result<(), ConnectionError>;

    /// Blocks until a peer connects to this listener
    fn accept(&self) -> Result<Arc<dyn Connection>, ConnectionError>;

    /// Writes all of `buffer`
    fn send(&self, buffer: &[u8]) -> Result<(), ConnectionError>;

    /// Fills all of `buffer`
    fn recv(&self, buffer: &mut [u8]) -> Result<(), ConnectionError>;

    fn close(&self);

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Creates an unconnected Connection of the given type with default config
pub fn create_connection(
    connection_type: ConnectionType,
) -> Result<Arc<dyn Connection>, ConnectionError> {
    create_connection_with_config(connection_type, ConnectionConfig::default())
}

pub fn create_connection_with_config(
    connection_type: ConnectionType,
    config: ConnectionConfig,
) -> Result<Arc<dyn Connection>, ConnectionError> {
    match connection_type {
        ConnectionType::TcpIp => Ok(Arc::new(SocketConnection::new(connection_type, config))),
        ConnectionType::Sdp => Err(ConnectionError::Unsupported { connection_type }),
        ConnectionType::Pipe | ConnectionType::NamedPipe if cfg!(unix) => {
            Ok(Arc::new(SocketConnection::new(connection_type, config)))
        }
        ConnectionType::Pipe | ConnectionType::NamedPipe => {
            Err(ConnectionError::Unsupported { connection_type })
        }
    }
}
