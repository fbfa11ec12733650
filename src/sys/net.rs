//! TCP sockets.
//!
//! Sockets are always non-blocking. Blocking calls wait for readiness;
//! asynchronous calls suspend the chain on it.
//!
//! A peer that resets or aborts the connection (or a socket that is no
//! longer connected) during an asynchronous transfer is reported as end of
//! stream, carrying whatever was transferred before, rather than as an
//! error. Blocking calls report these as errors.

use super::fd::{self, EndOfStream};
use super::signal::Signal;
use crate::cancel::CancelHandle;
use crate::error::{Error, ErrorKind, Result};
use crate::io::{AsyncRead, AsyncWrite, SyncRead, SyncWrite, TransferResult};
use crate::runtime::{current_env, signaled, Task};
use crate::tracing_compat::debug;
use socket2::{Domain, Protocol, SockAddr, Type};
use std::io;
use std::net::{self, Shutdown, SocketAddr, ToSocketAddrs};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

/// How long [`Socket::connect`] tries each resolved address.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const LISTEN_BACKLOG: i32 = 128;

fn peer_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
    )
}

fn never(_: &io::Error) -> bool {
    false
}

fn domain_for(addr: &SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

/// A connected TCP socket.
#[derive(Debug)]
pub struct Socket {
    stream: net::TcpStream,
    cancel: CancelHandle,
}

impl Socket {
    /// Connects to `host:port`, trying each resolved address for up to
    /// [`CONNECT_TIMEOUT`].
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match connect_one(&addr) {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Self::from_std(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.map_or_else(
            || {
                Error::new(ErrorKind::InvalidArgument)
                    .with_message(format!("{host}:{port} did not resolve"))
            },
            Error::io,
        ))
    }

    /// Starts listening on `port` on all IPv4 interfaces.
    pub fn listen(port: u16) -> Result<Listener> {
        Listener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Wraps a connected standard library stream, making it non-blocking.
    pub fn from_std(stream: net::TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            cancel: CancelHandle::new(),
        })
    }

    /// Shuts down one or both directions.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.stream.shutdown(how).map_err(Error::io)
    }

    /// The local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Error::io)
    }

    /// The peer address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Error::io)
    }

    /// Aborts an outstanding asynchronous operation.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The underlying stream.
    #[must_use]
    pub fn as_std(&self) -> &net::TcpStream {
        &self.stream
    }
}

fn connect_one(addr: &SocketAddr) -> io::Result<net::TcpStream> {
    let socket = socket2::Socket::new(domain_for(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&SockAddr::from(*addr), CONNECT_TIMEOUT)?;
    Ok(socket.into())
}

impl AsFd for Socket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}

impl SyncRead for Socket {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<TransferResult<usize>> {
        fd::read_blocking(&self.stream, buf, never)
    }
}

impl SyncWrite for Socket {
    fn write_from(&mut self, buf: &[u8]) -> Result<TransferResult<usize>> {
        fd::write_blocking(&self.stream, buf, never)
    }
}

impl AsyncRead for Socket {
    fn read_async_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Task<'a, TransferResult<usize>> {
        let ends: EndOfStream = peer_gone;
        Task::new(fd::read_ready(&self.stream, buf, true, &self.cancel, ends))
    }
}

impl AsyncWrite for Socket {
    fn write_async_from<'a>(&'a mut self, buf: &'a [u8]) -> Task<'a, TransferResult<usize>> {
        let ends: EndOfStream = peer_gone;
        Task::new(fd::write_ready(&self.stream, buf, true, &self.cancel, ends))
    }
}

/// A listening TCP socket.
#[derive(Debug)]
pub struct Listener {
    listener: net::TcpListener,
    cancel: CancelHandle,
}

impl Listener {
    /// Binds and listens on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = socket2::Socket::new(domain_for(&addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SockAddr::from(addr))?;
        socket.listen(LISTEN_BACKLOG)?;
        socket.set_nonblocking(true)?;
        let listener: net::TcpListener = socket.into();
        let local = listener.local_addr()?;
        debug!(addr = %local, "listening");
        Ok(Self {
            listener,
            cancel: CancelHandle::new(),
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::io)
    }

    /// Waits for the next connection.
    pub fn accept(&self) -> Result<(Socket, SocketAddr)> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => return Ok((Socket::from_std(stream)?, peer)),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    Signal::readable(&self.listener).wait(None)?;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::io(err)),
            }
        }
    }

    /// Suspends the calling chain until the next connection arrives.
    pub fn accept_async(&self) -> Task<'_, (Socket, SocketAddr)> {
        Task::new(async move {
            let env = current_env().await?;
            let _armed = self.cancel.arm(&env);
            loop {
                match self.listener.accept() {
                    Ok((stream, peer)) => return Ok((Socket::from_std(stream)?, peer)),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        signaled(Signal::readable(&self.listener)).await?;
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => return Err(Error::io(err)),
                }
            }
        })
    }

    /// Aborts an outstanding [`accept_async`](Self::accept_async).
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }
}
