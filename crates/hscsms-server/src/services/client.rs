// ============================================
// File: crates/hscsms-server/src/services/client.rs
// ============================================
//! # Server-Side Client
//!
//! ## Creation Reason
//! Binds one accepted `Connection` to its handshake state and login
//! state, and gives the rest of the server a single place to send to or
//! disconnect a client.
//!
//! ## Main Functionality
//! - `ServerClient::send`: encrypts with the session key once the
//!   handshake is ready, plaintext before
//! - `ServerClient::disconnect`: tells the client why, then closes after
//!   the send queue drains
//! - `install_disconnect_handler`: reacts to `ServerboundDisconnect`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers capture `Arc<ServerClient>`; the connection clears its
//!   tree at teardown, which drops those captures
//! - Never hold the handshake lock while calling `send`
//!
//! ## Last Modified
//! v0.1.0 - Initial server client

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use hscsms_common::ConnectionId;
use hscsms_core::crypto::AsymmetricProfile;
use hscsms_core::protocol::{ClientboundDisconnect, DisconnectReason, ServerboundDisconnect};
use hscsms_core::{HandlerResult, Packet};
use hscsms_transport::Connection;

use crate::error::Result;
use crate::services::handshake::ServerHandshake;
use crate::services::users::UserId;

/// One connected client as seen by the server.
pub struct ServerClient {
    conn: Connection,
    handshake: ServerHandshake,
    last_reason: Mutex<Option<DisconnectReason>>,
    user_id: RwLock<Option<UserId>>,
}

impl ServerClient {
    /// Wraps a not-yet-started connection.
    #[must_use]
    pub fn new(conn: Connection, server_key: Arc<AsymmetricProfile>) -> Arc<Self> {
        Arc::new(Self {
            conn,
            handshake: ServerHandshake::new(server_key),
            last_reason: Mutex::new(None),
            user_id: RwLock::new(None),
        })
    }

    /// Returns the connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Returns the remote address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.conn.peer_addr()
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the handshake state holder.
    #[must_use]
    pub fn handshake(&self) -> &ServerHandshake {
        &self.handshake
    }

    /// Returns `true` once the handshake is verified.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.handshake.is_ready()
    }

    /// Reason passed to the last `disconnect` call.
    #[must_use]
    pub fn last_reason(&self) -> Option<DisconnectReason> {
        *self.last_reason.lock()
    }

    /// Id of the logged-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id.read().clone()
    }

    pub(crate) fn set_user_id(&self, id: UserId) {
        *self.user_id.write() = Some(id);
    }

    /// Queues `packet`, encrypted with the session key after the
    /// handshake, plaintext before.
    ///
    /// # Errors
    /// Transport errors from serialization, encryption or a closed
    /// connection.
    pub fn send(&self, packet: &Packet) -> Result<()> {
        match self.handshake.session() {
            Some(session) => self.conn.send_encrypted(packet, session.as_ref())?,
            None => self.conn.send(packet)?,
        }
        Ok(())
    }

    /// Sends `ClientboundDisconnect(reason)` and closes once it is
    /// written.
    pub fn disconnect(&self, reason: DisconnectReason) {
        *self.last_reason.lock() = Some(reason);
        let packet = Packet::new(ClientboundDisconnect { reason });
        if let Err(e) = self.send(&packet) {
            debug!(conn = %self.id(), "Disconnect notice not sent: {}", e);
        }
        self.conn.close();
    }
}

impl std::fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerClient")
            .field("id", &self.id())
            .field("peer", &self.peer_addr())
            .field("handshake", &self.handshake.state_name())
            .field("user_id", &self.user_id())
            .finish()
    }
}

/// Closes the connection when the client says goodbye.
pub fn install_disconnect_handler(client: &Arc<ServerClient>) {
    let id = client.id();
    client
        .connection()
        .node()
        .child_for::<ServerboundDisconnect>()
        .with_packet_handler::<ServerboundDisconnect, _>(move |conn, _, _| {
            info!(conn = %id, peer = %conn.peer_addr(), "Client requested disconnect");
            conn.close();
            HandlerResult::HALT
        });
}
