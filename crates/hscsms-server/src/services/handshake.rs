// ============================================
// File: crates/hscsms-server/src/services/handshake.rs
// ============================================
//! # Server Handshake
//!
//! ## Creation Reason
//! Drives the server half of the key exchange on one connection: announce
//! the RSA public key, adopt the client's AES session key, and verify the
//! client can use it before trusting encrypted traffic.
//!
//! ## Main Functionality
//! - `ServerHandshakeState`: explicit state enum
//! - `ServerHandshake`: per-client state holder
//! - `install`: one-shot handlers plus the opening public-key send
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ServerHandshake                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Unencrypted                                                 │
//! │     │  send ClientboundPublicKey (plain)                     │
//! │     ▼  decrypt inbound with RSA private key                  │
//! │  AwaitingClientKey                                           │
//! │     │  ◄── ServerboundClientKey (one-shot)                   │
//! │     │  decrypt inbound with AES session key                  │
//! │     ▼  send UnboundHandshakeOk(challenge) (AES)              │
//! │  AwaitingVerification { session, challenge }                 │
//! │     │  ◄── UnboundHandshakeOk (one-shot)                     │
//! │     ├── echo == challenge + "-modified" ──► Ready { session } │
//! │     └── anything else ──► KICK ──► Failed                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both handlers remove their node after firing; replays are dropped
//! - The echo comparison must stay constant-time
//! - Never call `ServerClient::send` while holding the state lock
//!
//! ## Last Modified
//! v0.1.0 - Initial server handshake

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use rand::Rng;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use hscsms_core::crypto::{AsymmetricProfile, CipherProfile, SymmetricProfile};
use hscsms_core::protocol::{
    ClientboundPublicKey, DisconnectReason, ServerboundClientKey, UnboundHandshakeOk,
    VERIFICATION_SUFFIX,
};
use hscsms_core::{HandlerResult, Packet};

use crate::error::Result;
use crate::services::client::ServerClient;

/// Raw challenge length before base64.
pub const CHALLENGE_LEN: usize = 16;

// ============================================
// ServerHandshakeState
// ============================================

/// Where one connection is in the handshake.
#[derive(Default)]
pub enum ServerHandshakeState {
    /// Nothing sent yet.
    #[default]
    Unencrypted,
    /// Public key sent; waiting for the session key.
    AwaitingClientKey,
    /// Challenge sent under the session key; waiting for the echo.
    AwaitingVerification {
        /// The client's session key.
        session: Arc<SymmetricProfile>,
        /// The challenge as sent.
        challenge: String,
    },
    /// Echo verified; traffic under `session` is trusted.
    Ready {
        /// The client's session key.
        session: Arc<SymmetricProfile>,
    },
    /// Verification failed; the client was kicked.
    Failed,
}

impl ServerHandshakeState {
    /// Short state name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unencrypted => "unencrypted",
            Self::AwaitingClientKey => "awaiting_client_key",
            Self::AwaitingVerification { .. } => "awaiting_verification",
            Self::Ready { .. } => "ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Debug for ServerHandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================
// ServerHandshake
// ============================================

/// Handshake state for one client.
pub struct ServerHandshake {
    server_key: Arc<AsymmetricProfile>,
    state: Mutex<ServerHandshakeState>,
}

impl ServerHandshake {
    /// Starts in `Unencrypted` with the server's top-level key.
    #[must_use]
    pub fn new(server_key: Arc<AsymmetricProfile>) -> Self {
        Self {
            server_key,
            state: Mutex::new(ServerHandshakeState::Unencrypted),
        }
    }

    /// Current state name.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    /// Returns `true` once verified.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), ServerHandshakeState::Ready { .. })
    }

    /// Returns `true` after a failed verification.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(*self.state.lock(), ServerHandshakeState::Failed)
    }

    /// The session profile, only once verified.
    #[must_use]
    pub fn session(&self) -> Option<Arc<SymmetricProfile>> {
        match &*self.state.lock() {
            ServerHandshakeState::Ready { session } => Some(Arc::clone(session)),
            _ => None,
        }
    }

    fn replace(&self, next: ServerHandshakeState) -> ServerHandshakeState {
        std::mem::replace(&mut *self.state.lock(), next)
    }
}

impl std::fmt::Debug for ServerHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandshake")
            .field("state", &self.state_name())
            .field("server_key", &self.server_key.fingerprint())
            .finish()
    }
}

// ============================================
// Challenge
// ============================================

/// Generates a verification challenge: 16 bytes in `30..150`, base64.
#[must_use]
pub fn generate_challenge() -> String {
    let mut rng = rand::thread_rng();
    let raw: Vec<u8> = (0..CHALLENGE_LEN).map(|_| rng.gen_range(30..150u8)).collect();
    BASE64.encode(raw)
}

/// The echo a well-behaved client sends back for `challenge`.
#[must_use]
pub fn expected_echo(challenge: &str) -> String {
    format!("{challenge}{VERIFICATION_SUFFIX}")
}

// ============================================
// Installation
// ============================================

/// Installs the one-shot handshake handlers and queues the public key.
///
/// `on_ready` runs on the read task right after verification succeeds;
/// nodes it installs see the next packet.
///
/// # Errors
/// Fails if the public key cannot be queued.
pub fn install<F>(client: &Arc<ServerClient>, on_ready: F) -> Result<()>
where
    F: Fn(&Arc<ServerClient>) + Send + Sync + 'static,
{
    let root = client.connection().node();

    let c = Arc::clone(client);
    root.child_for::<ServerboundClientKey>()
        .with_packet_handler::<ServerboundClientKey, _>(move |_, _, packet| {
            on_client_key(&c, packet);
            HandlerResult::HALT.remove()
        });

    let c = Arc::clone(client);
    root.child_for::<UnboundHandshakeOk>()
        .with_packet_handler::<UnboundHandshakeOk, _>(move |_, _, packet| {
            if on_verification(&c, packet) {
                on_ready(&c);
            }
            HandlerResult::HALT.remove()
        });

    begin(client)
}

fn begin(client: &ServerClient) -> Result<()> {
    let handshake = client.handshake();
    let conn = client.connection();

    let private: Arc<dyn CipherProfile> = handshake.server_key.clone();
    conn.set_decryption_profile(Some(private));
    conn.send(&Packet::new(ClientboundPublicKey::new(&handshake.server_key)))?;
    handshake.replace(ServerHandshakeState::AwaitingClientKey);

    debug!(conn = %client.id(), "Public key sent");
    Ok(())
}

fn on_client_key(client: &ServerClient, packet: &ServerboundClientKey) {
    let handshake = client.handshake();
    let conn = client.connection();

    let previous = handshake.replace(ServerHandshakeState::Failed);
    if !matches!(previous, ServerHandshakeState::AwaitingClientKey) {
        warn!(
            conn = %client.id(),
            state = previous.name(),
            "Client key received in unexpected state"
        );
        client.disconnect(DisconnectReason::Kick);
        return;
    }

    let session = Arc::new(SymmetricProfile::with_key(packet.key.clone()));
    let session_dyn: Arc<dyn CipherProfile> = session.clone();
    conn.set_decryption_profile(Some(session_dyn));

    let challenge = generate_challenge();
    let ok = Packet::new(UnboundHandshakeOk {
        message: challenge.clone(),
    });
    if let Err(e) = conn.send_encrypted(&ok, session.as_ref()) {
        warn!(conn = %client.id(), "Failed to send challenge: {}", e);
        client.disconnect(DisconnectReason::Kick);
        return;
    }

    handshake.replace(ServerHandshakeState::AwaitingVerification { session, challenge });
    debug!(conn = %client.id(), "Session key adopted, challenge sent");
}

fn on_verification(client: &ServerClient, packet: &UnboundHandshakeOk) -> bool {
    let handshake = client.handshake();

    let previous = handshake.replace(ServerHandshakeState::Failed);
    let verified = match previous {
        ServerHandshakeState::AwaitingVerification { session, challenge } => {
            let expected = expected_echo(&challenge);
            if bool::from(packet.message.as_bytes().ct_eq(expected.as_bytes())) {
                handshake.replace(ServerHandshakeState::Ready { session });
                true
            } else {
                warn!(conn = %client.id(), peer = %client.peer_addr(), "Handshake echo mismatch");
                false
            }
        }
        other => {
            warn!(
                conn = %client.id(),
                state = other.name(),
                "Handshake OK received in unexpected state"
            );
            false
        }
    };

    if verified {
        info!(conn = %client.id(), peer = %client.peer_addr(), "Handshake verified");
    } else {
        client.disconnect(DisconnectReason::Kick);
    }
    verified
}

// ============================================
// Tests
// ============================================
