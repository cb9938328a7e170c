use std::{
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    thread,
};

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use super::{
    connection::{Connection, ConnectionState},
    connection_config::ConnectionConfig,
    connection_description::ConnectionDescription,
    connection_type::ConnectionType,
    error::ConnectionError,
    socket::{Listener, Socket},
};

cfg_if! {
    if #[cfg(unix)] {
        use std::{os::unix::net::UnixStream, path::PathBuf};
    }
}

/// A [`Connection`] backed by an OS stream socket: TCP for `TcpIp`, Unix
/// domain sockets for `NamedPipe` and a socket pair for the anonymous `Pipe`
pub struct SocketConnection {
    connection_type: ConnectionType,
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    description: RwLock<ConnectionDescription>,
    socket: RwLock<Option<Arc<Socket>>>,
    listener: RwLock<Option<Arc<Listener>>>,
    // other end of an anonymous pipe, handed out once by `accept`
    pipe_sibling: Mutex<Option<Socket>>,
    send_lock: Mutex<()>,
    recv_lock: Mutex<()>,
}

impl SocketConnection {
    pub fn new(connection_type: ConnectionType, config: ConnectionConfig) -> Self {
        Self {
            connection_type,
            config,
            state: RwLock::new(ConnectionState::Closed),
            description: RwLock::new(ConnectionDescription {
                connection_type,
                ..ConnectionDescription::default()
            }),
            socket: RwLock::new(None),
            listener: RwLock::new(None),
            pipe_sibling: Mutex::new(None),
            send_lock: Mutex::new(()),
            recv_lock: Mutex::new(()),
        }
    }

    fn connected(
        connection_type: ConnectionType,
        config: ConnectionConfig,
        description: ConnectionDescription,
        socket: Socket,
    ) -> Self {
        let connection = Self::new(connection_type, config);
        *connection.state.write() = ConnectionState::Connected;
        *connection.description.write() = description;
        *connection.socket.write() = Some(Arc::new(socket));
        connection
    }

    fn begin(
        &self,
        operation: &'static str,
        description: &ConnectionDescription,
        next: ConnectionState,
    ) -> Result<(), ConnectionError> {
        if description.connection_type != self.connection_type {
            return Err(ConnectionError::InvalidDescription {
                description: description.to_string(),
                reason: "connection type does not match the connection",
            });
        }

        let mut state = self.state.write();
        if *state != ConnectionState::Closed {
            return Err(ConnectionError::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = next;
        Ok(())
    }

    fn current_socket(&self, operation: &'static str) -> Result<Arc<Socket>, ConnectionError> {
        if let Some(socket) = self.socket.read().as_ref() {
            return Ok(socket.clone());
        }
        match self.state() {
            ConnectionState::Closed => Err(ConnectionError::Closed),
            state => Err(ConnectionError::InvalidState { operation, state }),
        }
    }

    fn connect_tcp(&self, description: &ConnectionDescription) -> Result<Socket, ConnectionError> {
        let address = description.connect_address();
        let resolved: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|error| ConnectionError::Unreachable {
                address: address.clone(),
                reason: error.to_string(),
            })?
            .collect();

        let mut last_error = None;
        for socket_address in resolved {
            match TcpStream::connect_timeout(&socket_address, self.config.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|error| ConnectionError::io("connect", &error))?;
                    return Ok(Socket::Tcp(stream));
                }
                Err(error) => last_error = Some(error),
            }
        }

        Err(match last_error {
            Some(error) => connect_error(&address, &error),
            None => ConnectionError::Unreachable {
                address,
                reason: "hostname did not resolve to any address".to_string(),
            },
        })
    }

    #[cfg(unix)]
    fn connect_pipe(&self) -> Result<Socket, ConnectionError> {
        let (local, remote) =
            UnixStream::pair().map_err(|error| ConnectionError::io("connect", &error))?;
        *self.pipe_sibling.lock() = Some(Socket::Unix(remote));
        Ok(Socket::Unix(local))
    }

    #[cfg(unix)]
    fn connect_named_pipe(
        &self,
        description: &ConnectionDescription,
    ) -> Result<Socket, ConnectionError> {
        UnixStream::connect(&description.filename)
            .map(Socket::Unix)
            .map_err(|error| connect_error(&description.filename, &error))
    }

    // A close() that ran while connecting wins, the new socket is dropped
    fn finish_connect(
        &self,
        description: &ConnectionDescription,
        socket: Socket,
    ) -> Result<(), ConnectionError> {
        let mut state = self.state.write();
        if *state != ConnectionState::Connecting {
            drop(state);
            socket.shutdown();
            self.pipe_sibling.lock().take();
            debug!("SocketConnection: closed while connecting to {}", description);
            return Err(ConnectionError::Closed);
        }
        *self.description.write() = description.clone();
        *self.socket.write() = Some(Arc::new(socket));
        *state = ConnectionState::Connected;
        info!("SocketConnection: connected to {}", description);
        Ok(())
    }

    fn bind(&self, description: &mut ConnectionDescription) -> Result<Listener, ConnectionError> {
        match self.connection_type {
            ConnectionType::TcpIp => {
                let address = description.listen_address();
                let listener =
                    Listener::bind_tcp(&address).map_err(|error| listen_error(&address, &error))?;
                if let Some(port) = listener.local_port() {
                    description.port = port;
                }
                Ok(listener)
            }
            #[cfg(unix)]
            ConnectionType::NamedPipe => {
                let path = PathBuf::from(&description.filename);
                Listener::bind_unix(path).map_err(|error| listen_error(&description.filename, &error))
            }
            connection_type => Err(ConnectionError::Unsupported { connection_type }),
        }
    }

    fn accept_pipe(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        match self.pipe_sibling.lock().take() {
            Some(socket) => Ok(Arc::new(Self::connected(
                self.connection_type,
                self.config.clone(),
                self.description(),
                socket,
            ))),
            None => Err(ConnectionError::InvalidState {
                operation: "accept",
                state: self.state(),
            }),
        }
    }

    // Closes the connection after a transfer failure and picks the error to
    // report. A local close wins over whatever the OS said.
    fn transfer_failed(&self, error: ConnectionError) -> ConnectionError {
        let closed_locally = self.state() == ConnectionState::Closed;
        self.close();
        if closed_locally {
            ConnectionError::Closed
        } else {
            error
        }
    }
}

impl Connection for SocketConnection {
    fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn description(&self) -> ConnectionDescription {
        self.description.read().clone()
    }

    fn peer_address(&self) -> Option<String> {
        self.socket
            .read()
            .as_ref()
            .and_then(|socket| socket.peer_address())
    }

    fn connect(&self, description: &ConnectionDescription) -> Result<(), ConnectionError> {
        self.begin("connect", description, ConnectionState::Connecting)?;

        let result = match self.connection_type {
            ConnectionType::TcpIp => self.connect_tcp(description),
            #[cfg(unix)]
            ConnectionType::Pipe => self.connect_pipe(),
            #[cfg(unix)]
            ConnectionType::NamedPipe => self.connect_named_pipe(description),
            connection_type => Err(ConnectionError::Unsupported { connection_type }),
        };

        match result {
            Ok(socket) => self.finish_connect(description, socket),
            Err(error) => {
                *self.state.write() = ConnectionState::Closed;
                Err(error)
            }
        }
    }

    fn listen(&self, description: &ConnectionDescription) -> Result<(), ConnectionError> {
        self.begin("listen", description, ConnectionState::Listening)?;

        let mut bound = description.clone();
        match self.bind(&mut bound) {
            Ok(listener) => {
                info!("SocketConnection: listening on {}", bound);
                *self.description.write() = bound;
                *self.listener.write() = Some(Arc::new(listener));
                Ok(())
            }
            Err(error) => {
                *self.state.write() = ConnectionState::Closed;
                Err(error)
            }
        }
    }

    fn accept(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        if self.connection_type == ConnectionType::Pipe {
            return self.accept_pipe();
        }

        let listener = match self.listener.read().as_ref() {
            Some(listener) => listener.clone(),
            None => {
                return Err(match self.state() {
                    ConnectionState::Closed => ConnectionError::Closed,
                    state => ConnectionError::InvalidState {
                        operation: "accept",
                        state,
                    },
                })
            }
        };

        loop {
            if self.state() != ConnectionState::Listening {
                return Err(ConnectionError::Closed);
            }

            match listener.accept() {
                Ok(Some(socket)) => {
                    debug!(
                        "SocketConnection: accepted {}",
                        socket.peer_address().unwrap_or_default()
                    );
                    return Ok(Arc::new(Self::connected(
                        self.connection_type,
                        self.config.clone(),
                        self.description(),
                        socket,
                    )));
                }
                Ok(None) => thread::sleep(self.config.accept_poll_interval),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(ConnectionError::io("accept", &error)),
            }
        }
    }

    fn send(&self, buffer: &[u8]) -> Result<(), ConnectionError> {
        let socket = self.current_socket("send")?;
        let _guard = self.send_lock.lock();

        let mut transferred = 0;
        while transferred < buffer.len() {
            match socket.write(&buffer[transferred..]) {
                Ok(0) => {
                    return Err(self.transfer_failed(ConnectionError::Reset {
                        transferred,
                        expected: buffer.len(),
                    }))
                }
                Ok(written) => transferred += written,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    return Err(self.transfer_failed(transfer_error(
                        "send",
                        &error,
                        transferred,
                        buffer.len(),
                    )))
                }
            }
        }
        Ok(())
    }

    fn recv(&self, buffer: &mut [u8]) -> Result<(), ConnectionError> {
        let socket = self.current_socket("recv")?;
        let _guard = self.recv_lock.lock();

        let expected = buffer.len();
        let mut transferred = 0;
        while transferred < expected {
            match socket.read(&mut buffer[transferred..]) {
                Ok(0) => {
                    return Err(self.transfer_failed(ConnectionError::Reset {
                        transferred,
                        expected,
                    }))
                }
                Ok(read) => transferred += read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    return Err(self.transfer_failed(transfer_error(
                        "recv",
                        &error,
                        transferred,
                        expected,
                    )))
                }
            }
        }
        Ok(())
    }

    fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return;
        }

        if let Some(socket) = self.socket.write().take() {
            socket.shutdown();
        }
        self.listener.write().take();
        self.pipe_sibling.lock().take();

        debug!("SocketConnection: closed {}", self.description.read());
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn connect_error(address: &str, error: &io::Error) -> ConnectionError {
    match error.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => ConnectionError::Refused {
            address: address.to_string(),
        },
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectionError::TimedOut {
            address: address.to_string(),
        },
        _ => ConnectionError::Unreachable {
            address: address.to_string(),
            reason: error.to_string(),
        },
    }
}

fn listen_error(address: &str, error: &io::Error) -> ConnectionError {
    match error.kind() {
        io::ErrorKind::AddrInUse => ConnectionError::AddressInUse {
            address: address.to_string(),
        },
        _ => ConnectionError::io("listen", error),
    }
}

fn transfer_error(
    operation: &'static str,
    error: &io::Error,
    transferred: usize,
    expected: usize,
) -> ConnectionError {
    match error.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ConnectionError::Reset {
            transferred,
            expected,
        },
        _ => ConnectionError::io(operation, error),
    }
}
