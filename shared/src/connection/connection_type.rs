use std::{fmt, str::FromStr};

use super::error::ConnectionError;

/// The transport a [`Connection`](super::connection::Connection) runs over
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// TCP/IP socket
    TcpIp,
    /// Sockets Direct Protocol over InfiniBand
    Sdp,
    /// Anonymous, in-process pipe
    Pipe,
    /// Named pipe addressed by a filename
    NamedPipe,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::TcpIp => "TCPIP",
            ConnectionType::Sdp => "SDP",
            ConnectionType::Pipe => "ANON_PIPE",
            ConnectionType::NamedPipe => "PIPE",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = ConnectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "TCPIP" | "TCP" => Ok(ConnectionType::TcpIp),
            "SDP" => Ok(ConnectionType::Sdp),
            "ANON_PIPE" => Ok(ConnectionType::Pipe),
            "PIPE" => Ok(ConnectionType::NamedPipe),
            _ => Err(ConnectionError::InvalidDescription {
                description: value.to_string(),
                reason: "unknown connection type",
            }),
        }
    }
}
