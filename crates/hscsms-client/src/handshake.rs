// ============================================
// File: crates/hscsms-client/src/handshake.rs
// ============================================
//! # Client Handshake
//!
//! ## Creation Reason
//! Drives the client half of the key exchange: on the server's public key,
//! pick a fresh AES session key and send it RSA-encrypted; on the
//! server's challenge, echo it back with the agreed suffix.
//!
//! ## Main Functionality
//! - `ClientHandshakeState`: explicit state enum
//! - `ClientHandshake`: state holder plus a watch channel for waiters
//! - `install`: one-shot handlers on a connection's tree
//!
//! ## Handshake Flow
//! ```text
//! AwaitingPublicKey
//!    │  ◄── ClientboundPublicKey (plain, one-shot)
//!    │  generate session key, decrypt inbound with it
//!    ▼  send ServerboundClientKey (RSA)
//! AwaitingOk { session }
//!    │  ◄── UnboundHandshakeOk(challenge) (AES, one-shot)
//!    ▼  send UnboundHandshakeOk(challenge + "-modified") (AES)
//! Ready { session }
//!
//! any unexpected packet or send failure ──► Failed (connection stopped)
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial client handshake

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use hscsms_core::crypto::{CipherProfile, SymmetricProfile};
use hscsms_core::protocol::{
    ClientboundPublicKey, ServerboundClientKey, UnboundHandshakeOk, VERIFICATION_SUFFIX,
};
use hscsms_core::{HandlerResult, Packet};
use hscsms_transport::Connection;

use crate::error::{ClientError, Result};

// ============================================
// State
// ============================================

/// Where the client is in the handshake.
#[derive(Default)]
pub enum ClientHandshakeState {
    /// Connected, nothing received yet.
    #[default]
    AwaitingPublicKey,
    /// Session key sent; waiting for the challenge.
    AwaitingOk {
        /// Our session key.
        session: Arc<SymmetricProfile>,
    },
    /// Challenge echoed; the session key is in use.
    Ready {
        /// Our session key.
        session: Arc<SymmetricProfile>,
    },
    /// Handshake aborted.
    Failed,
}

impl ClientHandshakeState {
    /// Short state name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingPublicKey => "awaiting_public_key",
            Self::AwaitingOk { .. } => "awaiting_ok",
            Self::Ready { .. } => "ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Debug for ClientHandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What `wait_ready` callers observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Still exchanging keys.
    Pending,
    /// Handshake completed.
    Ready,
    /// Handshake aborted or the connection closed first.
    Failed(String),
    /// Connection closed after a completed handshake.
    Closed,
}

// ============================================
// ClientHandshake
// ============================================

/// Handshake state for one connection.
pub struct ClientHandshake {
    state: Mutex<ClientHandshakeState>,
    status_tx: watch::Sender<HandshakeStatus>,
}

impl ClientHandshake {
    /// Starts in `AwaitingPublicKey`.
    #[must_use]
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(HandshakeStatus::Pending);
        Self {
            state: Mutex::new(ClientHandshakeState::AwaitingPublicKey),
            status_tx,
        }
    }

    /// Current state name.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    /// Returns `true` once the challenge was echoed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), ClientHandshakeState::Ready { .. })
    }

    /// The session profile, only once ready.
    #[must_use]
    pub fn session(&self) -> Option<Arc<SymmetricProfile>> {
        match &*self.state.lock() {
            ClientHandshakeState::Ready { session } => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Current status as seen by waiters.
    #[must_use]
    pub fn status(&self) -> HandshakeStatus {
        self.status_tx.borrow().clone()
    }

    /// Waits until the handshake leaves `Pending`.
    ///
    /// # Errors
    /// `HandshakeFailed` if the handshake aborted or the connection
    /// closed.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.status_tx.subscribe();
        let status = rx
            .wait_for(|status| *status != HandshakeStatus::Pending)
            .await
            .map_err(|_| ClientError::handshake_failed("handshake dropped"))?
            .clone();

        match status {
            HandshakeStatus::Ready => Ok(()),
            HandshakeStatus::Failed(reason) => Err(ClientError::handshake_failed(reason)),
            HandshakeStatus::Closed => Err(ClientError::handshake_failed("connection closed")),
            HandshakeStatus::Pending => Err(ClientError::handshake_failed("still pending")),
        }
    }

    /// Records that the connection is gone.
    pub fn connection_closed(&self, reason: impl Into<String>) {
        let ready = self.is_ready();
        if !ready {
            *self.state.lock() = ClientHandshakeState::Failed;
        }
        let reason = reason.into();
        self.status_tx.send_modify(|status| {
            *status = match status {
                HandshakeStatus::Pending => HandshakeStatus::Failed(reason),
                HandshakeStatus::Failed(previous) => HandshakeStatus::Failed(previous.clone()),
                HandshakeStatus::Ready | HandshakeStatus::Closed => HandshakeStatus::Closed,
            };
        });
    }

    fn replace(&self, next: ClientHandshakeState) -> ClientHandshakeState {
        std::mem::replace(&mut *self.state.lock(), next)
    }

    fn fail(&self, conn: &Connection, reason: &str) {
        warn!(conn = %conn.id(), "Handshake failed: {}", reason);
        self.replace(ClientHandshakeState::Failed);
        self.status_tx
            .send_replace(HandshakeStatus::Failed(reason.to_string()));
        conn.stop();
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("state", &self.state_name())
            .finish()
    }
}

// ============================================
// Installation
// ============================================

/// Installs the two one-shot handshake handlers on `conn`.
pub fn install(conn: &Connection, handshake: &Arc<ClientHandshake>) {
    let root = conn.node();

    let hs = Arc::clone(handshake);
    root.child_for::<ClientboundPublicKey>()
        .with_packet_handler::<ClientboundPublicKey, _>(move |conn, _, packet| {
            on_public_key(&hs, conn, packet);
            HandlerResult::HALT.remove()
        });

    let hs = Arc::clone(handshake);
    root.child_for::<UnboundHandshakeOk>()
        .with_packet_handler::<UnboundHandshakeOk, _>(move |conn, _, packet| {
            on_challenge(&hs, conn, packet);
            HandlerResult::HALT.remove()
        });
}

fn on_public_key(handshake: &ClientHandshake, conn: &Connection, packet: &ClientboundPublicKey) {
    if !matches!(
        handshake.replace(ClientHandshakeState::Failed),
        ClientHandshakeState::AwaitingPublicKey
    ) {
        handshake.fail(conn, "public key received out of order");
        return;
    }

    let server_key = packet.profile();
    debug!(conn = %conn.id(), fingerprint = %server_key.fingerprint(), "Server public key received");

    let session = Arc::new(SymmetricProfile::generate());
    let session_dyn: Arc<dyn CipherProfile> = session.clone();
    conn.set_decryption_profile(Some(session_dyn));

    let reply = Packet::new(ServerboundClientKey {
        key: session.key().clone(),
    });
    if let Err(e) = conn.send_encrypted(&reply, &server_key) {
        handshake.fail(conn, &format!("failed to send session key: {e}"));
        return;
    }

    handshake.replace(ClientHandshakeState::AwaitingOk { session });
}

fn on_challenge(handshake: &ClientHandshake, conn: &Connection, packet: &UnboundHandshakeOk) {
    let ClientHandshakeState::AwaitingOk { session } =
        handshake.replace(ClientHandshakeState::Failed)
    else {
        handshake.fail(conn, "challenge received out of order");
        return;
    };

    let echo = Packet::new(UnboundHandshakeOk {
        message: format!("{}{}", packet.message, VERIFICATION_SUFFIX),
    });
    if let Err(e) = conn.send_encrypted(&echo, session.as_ref()) {
        handshake.fail(conn, &format!("failed to echo challenge: {e}"));
        return;
    }

    handshake.replace(ClientHandshakeState::Ready { session });
    handshake.status_tx.send_replace(HandshakeStatus::Ready);
    info!(conn = %conn.id(), peer = %conn.peer_addr(), "Handshake complete");
}

// ============================================
// Tests
// ============================================
