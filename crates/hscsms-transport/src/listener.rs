// ============================================
// File: crates/hscsms-transport/src/listener.rs
// ============================================
//! # TCP Listener
//!
//! ## Creation Reason
//! Wraps Tokio's TCP listener with socket options set up front, and
//! provides the matching outbound connect.
//!
//! ## Main Functionality
//! - `TcpAcceptor::bind`: bind with `SO_REUSEADDR`
//! - `TcpAcceptor::accept`: accept with `TCP_NODELAY` set
//! - `connect`: outbound stream with `TCP_NODELAY` set
//!
//! ## Design Choices
//! - Uses SO_REUSEADDR for quick rebinding after restart
//! - Frames are small and latency sensitive, so Nagle is disabled
//!
//! ## ⚠️ Important Note for Next Developer
//! - Binding port 0 picks a free port; read it back with `local_addr()`
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP listener

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Pending-connection backlog passed to `listen(2)`.
pub const LISTEN_BACKLOG: i32 = 1024;

// ============================================
// TcpAcceptor
// ============================================

/// Listening TCP socket.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// Binds to an address string such as `"0.0.0.0:5050"`.
    ///
    /// # Errors
    /// - `InvalidAddress`: If the string does not parse
    /// - See [`TcpAcceptor::bind_addr`]
    pub fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr =
            addr_str
                .parse()
                .map_err(|_| TransportError::InvalidAddress {
                    addr: addr_str.to_string(),
                })?;

        Self::bind_addr(socket_addr)
    }

    /// Binds to a socket address.
    ///
    /// # Socket Options
    /// - `SO_REUSEADDR`: Enabled for quick rebinding
    /// - Non-blocking: Required for async operations
    ///
    /// # Errors
    /// - `BindFailed`: If binding fails
    /// - `AddressInUse`: If address is already in use
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        info!("Binding TCP listener to {}", addr);

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| TransportError::io("creating TCP socket", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;

        socket.bind(&addr.into()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse { addr }
            } else {
                TransportError::bind_failed(addr, e.to_string())
            }
        })?;

        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

        // Convert to Tokio listener
        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| TransportError::io("converting to Tokio listener", e))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        info!("TCP listener bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next inbound connection.
    ///
    /// # Errors
    /// Returns `Io` if accepting fails.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::io("accepting connection", e))?;

        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::io("setting TCP_NODELAY", e))?;

        debug!("Accepted TCP connection from {}", peer);
        Ok((stream, peer))
    }
}

/// Opens an outbound TCP stream.
///
/// # Errors
/// Returns `ConnectFailed` if the peer is unreachable.
pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| TransportError::connect_failed(addr, e.to_string()))?;

    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::io("setting TCP_NODELAY", e))?;

    debug!("Connected to {}", addr);
    Ok(stream)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        assert_ne!(acceptor.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address() {
        assert!(matches!(
            TcpAcceptor::bind("not-an-address"),
            Err(TransportError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_accept_and_connect() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = connect(addr).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
        });

        let (mut stream, _) = acceptor.accept().await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr();
        drop(acceptor);

        let err = connect(addr).await.unwrap_err();
        assert!(err.is_network_error());
    }
}
