// ============================================
// File: crates/hscsms-client/src/session.rs
// ============================================
//! # Client Session
//!
//! ## Creation Reason
//! The client-side counterpart of the server's per-client state: one TCP
//! connection, its handshake, and request/response helpers for the login
//! packets.
//!
//! ## Main Functionality
//! - `ClientSession::connect`: dial, install handlers, start
//! - `wait_ready`: await the handshake
//! - `create_user` / `login`: encrypted request, awaited result
//! - `disconnect` / `reconnect`
//!
//! ## Session Layout
//! ```text
//! ClientSession
//!   └── RwLock<Arc<Link>>          replaced by reconnect()
//!         ├── Connection
//!         │     └── root
//!         │          ├── ClientboundPublicKey     handshake (one-shot)
//!         │          ├── UnboundHandshakeOk       handshake (one-shot)
//!         │          ├── ClientboundDisconnect    record reason, stop, HALT
//!         │          └── ClientboundLoginResult   → results channel
//!         ├── ClientHandshake
//!         └── results: Mutex<Receiver>       one request in flight at a time
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Requests are serialized by the results lock so answers pair up with
//!   the request that caused them
//! - The server sends at most one result per request; results left over
//!   from a timed-out request are discarded before the next one is sent
//!
//! ## Last Modified
//! v0.1.0 - Initial client session

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info};

use hscsms_core::protocol::{
    ClientboundDisconnect, ClientboundLoginResult, Credentials, DisconnectReason,
    ServerboundCreateUser, ServerboundDisconnect, ServerboundLogin,
};
use hscsms_core::{HandlerResult, Packet, PacketRegistry};
use hscsms_transport::{Connection, ConnectionConfig};

use crate::error::{ClientError, Result};
use crate::handshake::{self, ClientHandshake};

/// How long a create-user or login request waits for its answer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================
// Link
// ============================================

/// One connection attempt and everything hanging off it.
struct Link {
    conn: Connection,
    handshake: Arc<ClientHandshake>,
    results: tokio::sync::Mutex<mpsc::UnboundedReceiver<ClientboundLoginResult>>,
    disconnect_reason: Arc<Mutex<Option<DisconnectReason>>>,
}

impl Link {
    async fn open(
        addr: SocketAddr,
        registry: Arc<PacketRegistry>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let conn = Connection::connect(addr, registry, config).await?;
        let handshake = Arc::new(ClientHandshake::new());
        let disconnect_reason = Arc::new(Mutex::new(None));
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        handshake::install(&conn, &handshake);

        let root = conn.node();
        let reason_slot = Arc::clone(&disconnect_reason);
        root.child_for::<ClientboundDisconnect>()
            .with_packet_handler::<ClientboundDisconnect, _>(move |conn, _, packet| {
                info!(conn = %conn.id(), reason = %packet.reason, "Disconnected by server");
                *reason_slot.lock() = Some(packet.reason);
                conn.stop();
                HandlerResult::HALT
            });

        root.child_for::<ClientboundLoginResult>()
            .with_packet_handler::<ClientboundLoginResult, _>(move |conn, _, packet| {
                if results_tx.send(packet.clone()).is_err() {
                    debug!(conn = %conn.id(), "Login result with nobody waiting");
                }
                HandlerResult::HALT
            });

        let hs = Arc::clone(&handshake);
        let reason_slot = Arc::clone(&disconnect_reason);
        conn.on_disconnect(move |_, cause| {
            let reason = match (cause, *reason_slot.lock()) {
                (Some(e), _) => format!("connection error: {e}"),
                (None, Some(reason)) => format!("disconnected by server: {reason}"),
                (None, None) => "connection closed".to_string(),
            };
            hs.connection_closed(reason);
        });

        conn.start()?;
        debug!(conn = %conn.id(), peer = %addr, "Client connection started");

        Ok(Self {
            conn,
            handshake,
            results: tokio::sync::Mutex::new(results_rx),
            disconnect_reason,
        })
    }

    fn send(&self, packet: &Packet) -> Result<()> {
        let session = self.handshake.session().ok_or(ClientError::NotReady)?;
        self.conn.send_encrypted(packet, session.as_ref())?;
        Ok(())
    }

    fn disconnect(&self) {
        if !self.conn.is_active() {
            return;
        }
        let goodbye = Packet::new(ServerboundDisconnect);
        let sent = match self.handshake.session() {
            Some(session) => self.conn.send_encrypted(&goodbye, session.as_ref()),
            None => self.conn.send(&goodbye),
        };
        if let Err(e) = sent {
            debug!(conn = %self.conn.id(), "Goodbye not sent: {}", e);
        }
        self.conn.close();
    }
}

/// Drops results still queued from requests that already timed out, so
/// the next request cannot pick up an answer meant for an earlier one.
fn drain_stale(results: &mut mpsc::UnboundedReceiver<ClientboundLoginResult>) -> usize {
    let mut stale = 0;
    while results.try_recv().is_ok() {
        stale += 1;
    }
    stale
}

// ============================================
// ClientSession
// ============================================

/// A client's session with one server.
pub struct ClientSession {
    addr: SocketAddr,
    registry: Arc<PacketRegistry>,
    config: ConnectionConfig,
    link: RwLock<Arc<Link>>,
}

impl ClientSession {
    /// Connects to `addr` and starts the handshake. Does not wait for it;
    /// see [`ClientSession::wait_ready`].
    ///
    /// # Errors
    /// Transport errors from connecting.
    pub async fn connect(
        addr: SocketAddr,
        registry: Arc<PacketRegistry>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let link = Link::open(addr, Arc::clone(&registry), config).await?;
        Ok(Self {
            addr,
            registry,
            config,
            link: RwLock::new(Arc::new(link)),
        })
    }

    fn link(&self) -> Arc<Link> {
        Arc::clone(&self.link.read())
    }

    /// Server address.
    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current connection.
    #[must_use]
    pub fn connection(&self) -> Connection {
        self.link().conn.clone()
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link().conn.is_active()
    }

    /// Returns `true` once the handshake completed on the current
    /// connection.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.link().handshake.is_ready()
    }

    /// Reason from the server's last `ClientboundDisconnect`, if any.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.link().disconnect_reason.lock()
    }

    /// Waits for the handshake on the current connection.
    ///
    /// # Errors
    /// `HandshakeFailed` if the connection closes first.
    pub async fn wait_ready(&self) -> Result<()> {
        let link = self.link();
        link.handshake.wait_ready().await
    }

    /// Creates an account; returns its user id.
    ///
    /// # Errors
    /// - `Rejected` with the server's reason
    /// - `NotReady`, `Disconnected`, `Timeout`
    pub async fn create_user(&self, username: &str, password: &str) -> Result<String> {
        let packet = Packet::new(ServerboundCreateUser(Credentials::new(username, password)));
        self.request(packet, "create_user").await
    }

    /// Logs in; returns the user id.
    ///
    /// # Errors
    /// - `Rejected` with the server's reason
    /// - `NotReady`, `Disconnected`, `Timeout`
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let packet = Packet::new(ServerboundLogin(Credentials::new(username, password)));
        self.request(packet, "login").await
    }

    async fn request(&self, packet: Packet, operation: &str) -> Result<String> {
        let link = self.link();
        let mut results = link.results.lock().await;

        let stale = drain_stale(&mut results);
        if stale > 0 {
            debug!(conn = %link.conn.id(), stale, "Discarded late login results");
        }
        link.send(&packet)?;

        let result = tokio::time::timeout(REQUEST_TIMEOUT, results.recv())
            .await
            .map_err(|_| ClientError::Timeout {
                operation: operation.to_string(),
            })?
            .ok_or(ClientError::Disconnected)?;

        if result.success {
            Ok(result.detail)
        } else {
            Err(ClientError::rejected(result.detail))
        }
    }

    /// Says goodbye and closes once queued frames are written.
    pub fn disconnect(&self) {
        self.link().disconnect();
    }

    /// Drops the current connection (politely, if still open) and
    /// connects again with a fresh handshake.
    ///
    /// # Errors
    /// Transport errors from connecting.
    pub async fn reconnect(&self) -> Result<()> {
        self.disconnect();
        let link = Link::open(self.addr, Arc::clone(&self.registry), self.config).await?;
        *self.link.write() = Arc::new(link);
        info!(peer = %self.addr, "Reconnected");
        Ok(())
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.link.get_mut().conn.stop();
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = self.link();
        f.debug_struct("ClientSession")
            .field("server", &self.addr)
            .field("conn", &link.conn.id())
            .field("handshake", &link.handshake.state_name())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_result_not_paired_with_next_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ClientboundLoginResult::ok("late-answer")).unwrap();

        assert_eq!(drain_stale(&mut rx), 1);
        assert_eq!(drain_stale(&mut rx), 0);

        tx.send(ClientboundLoginResult::failed("invalid_password")).unwrap();
        let next = rx.try_recv().unwrap();
        assert!(!next.success);
        assert_eq!(next.detail, "invalid_password");
    }
}
