use log::debug;
use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
};

cfg_if! {
    if #[cfg(unix)] {
        use std::{
            os::unix::net::{UnixListener, UnixStream},
            path::PathBuf,
        };
    }
}

/// A connected, blocking stream socket
#[derive(Debug)]
pub(crate) enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Socket {
    pub fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(stream) => (&*stream).read(buffer),
            #[cfg(unix)]
            Socket::Unix(stream) => (&*stream).read(buffer),
        }
    }

    pub fn write(&self, buffer: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(stream) => (&*stream).write(buffer),
            #[cfg(unix)]
            Socket::Unix(stream) => (&*stream).write(buffer),
        }
    }

    /// Shuts down both directions, waking any thread blocked on this socket
    pub fn shutdown(&self) {
        let result = match self {
            Socket::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Socket::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        // NotConnected just means the peer beat us to it
        if let Err(error) = result {
            if error.kind() != io::ErrorKind::NotConnected {
                debug!("Socket: shutdown failed: {}", error);
            }
        }
    }

    pub fn peer_address(&self) -> Option<String> {
        match self {
            Socket::Tcp(stream) => stream.peer_addr().ok().map(|address| address.to_string()),
            #[cfg(unix)]
            Socket::Unix(stream) => stream.peer_addr().ok().map(|address| {
                address
                    .as_pathname()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "unnamed".to_string())
            }),
        }
    }
}

/// A non-blocking listening socket, polled by `accept`
#[derive(Debug)]
pub(crate) enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

impl Listener {
    pub fn bind_tcp(address: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        Ok(Listener::Tcp(listener))
    }

    #[cfg(unix)]
    pub fn bind_unix(path: PathBuf) -> io::Result<Self> {
        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;
        Ok(Listener::Unix(listener, path))
    }

    /// Returns `Ok(None)` if no peer is waiting
    pub fn accept(&self) -> io::Result<Option<Socket>> {
        let result = match self {
            Listener::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok(Socket::Tcp(stream))
            }),
            #[cfg(unix)]
            Listener::Unix(listener, _) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(Socket::Unix(stream))
            }),
        };

        match result {
            Ok(socket) => Ok(Some(socket)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub fn local_port(&self) -> Option<u16> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok().map(|address| address.port()),
            #[cfg(unix)]
            Listener::Unix(..) => None,
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix(_, path) = self {
            if let Err(error) = std::fs::remove_file(path.as_path()) {
                debug!("Listener: could not remove {}: {}", path.display(), error);
            }
        }
    }
}
