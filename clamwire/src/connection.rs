//! Transport connections to the daemon.
//!
//! Every scan session and every probe attempt dials its own connection and
//! drops it when done; nothing is pooled or shared.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tracing::trace;

use crate::{Address, Error, Result};

/// Opens connections for scan sessions and probe attempts.
///
/// Implemented by [`Connector`] and by any `Fn() -> Result<C>` closure, which
/// lets callers substitute their own transport.
pub trait Dial {
    /// The connection type produced.
    type Conn: Read + Write;

    /// Opens a fresh connection. No retries happen at this layer.
    fn dial(&self) -> Result<Self::Conn>;
}

impl<F, C> Dial for F
where
    F: Fn() -> Result<C>,
    C: Read + Write,
{
    type Conn = C;

    fn dial(&self) -> Result<C> {
        self()
    }
}

/// An open, exclusively owned connection. Closed on drop.
#[derive(Debug)]
#[non_exhaustive]
pub enum Connection {
    /// TCP stream.
    Tcp(TcpStream),
    /// Unix domain socket stream.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Self::Unix(s) => s.flush(),
        }
    }
}

/// Dials the daemon at a fixed address.
#[derive(Debug, Clone)]
pub struct Connector {
    /// Daemon address.
    address: Address,
    /// Bound on TCP connection establishment.
    connect_timeout: Duration,
    /// Per-read and per-write deadline on the open connection.
    io_timeout: Option<Duration>,
}

impl Connector {
    /// Creates a connector. `connect_timeout` must be non-zero.
    pub const fn new(address: Address, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            io_timeout: None,
        }
    }

    /// Sets a deadline applied to every read and write (`None` blocks forever).
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Returns the address this connector dials.
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Opens a connection.
    ///
    /// Unix sockets connect without a timeout; the I/O deadline still applies.
    pub fn connect(&self) -> Result<Connection> {
        self.open().map_err(|source| Error::Connect {
            address: self.address.clone(),
            source,
        })
    }

    /// Dials and configures the socket.
    fn open(&self) -> io::Result<Connection> {
        match &self.address {
            Address::Tcp(host_port) => {
                let stream = self.dial_tcp(host_port)?;
                stream.set_nodelay(true)?;
                stream.set_read_timeout(self.io_timeout)?;
                stream.set_write_timeout(self.io_timeout)?;
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Address::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(self.io_timeout)?;
                stream.set_write_timeout(self.io_timeout)?;
                Ok(Connection::Unix(stream))
            }
            #[cfg(not(unix))]
            Address::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    /// Tries each resolved address in turn.
    fn dial_tcp(&self, host_port: &str) -> io::Result<TcpStream> {
        let mut last = None;
        for addr in host_port.to_socket_addrs()? {
            trace!(%addr, "dialing");
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host_port} resolved to no addresses"),
            )
        }))
    }
}

impl Dial for Connector {
    type Conn = Connection;

    fn dial(&self) -> Result<Connection> {
        self.connect()
    }
}
