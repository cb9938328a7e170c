use std::io;

use thiserror::Error;

use super::{connection::ConnectionState, connection_type::ConnectionType};

/// Errors that can occur while establishing or using a Connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The transport is not available on this platform
    #[error("Connection type {connection_type} is not supported on this platform")]
    Unsupported { connection_type: ConnectionType },

    /// A connection description could not be parsed
    #[error("Could not parse connection description '{description}': {reason}")]
    InvalidDescription {
        description: String,
        reason: &'static str,
    },

    /// The peer actively refused the connection
    #[error("Connection to {address} refused")]
    Refused { address: String },

    /// The peer could not be reached at all
    #[error("Host {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    /// The connection attempt did not complete in time
    #[error("Connection to {address} timed out")]
    TimedOut { address: String },

    /// The local address is already bound by someone else
    #[error("Address {address} is already in use")]
    AddressInUse { address: String },

    /// The peer closed the connection or the link broke mid-transfer
    #[error("Connection reset by peer after {transferred} of {expected} bytes")]
    Reset { transferred: usize, expected: usize },

    /// The connection was closed locally
    #[error("Connection is closed")]
    Closed,

    /// The operation is not legal in the connection's current state
    #[error("Cannot {operation} a connection in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// Any other transport failure
    #[error("I/O error during {operation}: {message}")]
    Io {
        operation: &'static str,
        kind: io::ErrorKind,
        message: String,
    },
}

impl ConnectionError {
    pub(crate) fn io(operation: &'static str, error: &io::Error) -> Self {
        ConnectionError::Io {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
