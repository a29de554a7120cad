//! Connection establishment
//!
//! A bridge carries exactly one TCP connection: either the first peer that
//! connects to our listening port, or a single outbound connection. There is
//! no retry and no second client.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::AsRawFd;

use crate::config::Mode;
use crate::error::{NetworkError, NetworkResult};
use crate::interrupt::Interrupt;
use crate::poller;

/// An established TCP connection and its endpoints.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl Connection {
    fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        Ok(Self {
            stream,
            peer_addr,
            local_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.local_addr, self.peer_addr)
    }
}

/// A socket bound on all interfaces, waiting for its single peer.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind `0.0.0.0:<port>`. Port 0 picks an ephemeral port.
    ///
    /// The standard library enables address reuse on Unix, so a port left in
    /// TIME_WAIT by a previous run can be bound again right away.
    pub fn bind(port: u16) -> NetworkResult<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let inner = TcpListener::bind(addr).map_err(|source| NetworkError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = inner.local_addr().map_err(|source| NetworkError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        log::info!("Listening on {local_addr}");
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for one peer, then stop listening.
    ///
    /// Returns `Ok(None)` if `interrupt` fires first.
    pub fn accept_one(self, interrupt: &Interrupt) -> NetworkResult<Option<Connection>> {
        let accept_error = |source| NetworkError::Accept {
            addr: self.local_addr.to_string(),
            source,
        };

        loop {
            let [interrupted, incoming] = poller::wait_readable(
                [Some(interrupt.as_raw_fd()), Some(self.inner.as_raw_fd())],
                None,
            )
            .map_err(accept_error)?;

            if interrupted {
                log::debug!("interrupted while waiting for a connection");
                return Ok(None);
            }
            if !incoming {
                continue;
            }

            match self.inner.accept() {
                Ok((stream, addr)) => {
                    log::info!("Connection from {addr}");
                    let connection = Connection::from_stream(stream).map_err(accept_error)?;
                    return Ok(Some(connection));
                }
                Err(e) if is_transient_accept_error(&e) => {
                    log::debug!("accept: {e}, waiting again");
                }
                Err(e) => return Err(accept_error(e)),
            }
        }
    }
}

/// Errors after which the listener is still usable: a signal, or a peer that
/// gave up between the readiness report and the accept call.
fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionAborted
    )
}

/// Open one outbound connection to `host:port`.
pub fn connect(host: &str, port: u16) -> NetworkResult<Connection> {
    log::info!("Connecting to {host}:{port}");

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| NetworkError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(NetworkError::Resolve {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "No socket addresses resolved"),
        });
    }

    let connect_error = |source| NetworkError::Connect {
        host: host.to_string(),
        port,
        source,
    };
    let stream = TcpStream::connect(&addrs[..]).map_err(connect_error)?;
    let connection = Connection::from_stream(stream).map_err(connect_error)?;
    log::debug!("Connected to {}", connection.peer_addr());
    Ok(connection)
}

/// Establish the session's connection for `mode`.
///
/// Returns `Ok(None)` when the user interrupts before a connection exists.
pub fn establish(mode: &Mode, interrupt: &Interrupt) -> NetworkResult<Option<Connection>> {
    match mode {
        Mode::Listen { port } => Listener::bind(*port)?.accept_one(interrupt),
        Mode::Connect { host, port } => {
            let result = connect(host, *port);
            // A blocking connect cannot watch the interrupt channel, so check
            // it once the attempt is over.
            if interrupt.is_pending().unwrap_or(false) {
                return Ok(None);
            }
            result.map(Some)
        }
    }
}
