// ============================================
// File: crates/hscsms-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! Defines every packet kind exchanged between hscsms clients and
//! servers, with its identifier and body layout.
//!
//! ## Main Functionality
//! - Handshake packets: public key, client key, handshake ok
//! - Core packets: disconnect notices in both directions
//! - Login packets: create user, login, login result
//! - `DisconnectReason`: why a server ends a connection
//!
//! ## Message Flow
//! ```text
//! Client                                         Server
//!   │ ◄─────────────────── ClientboundPublicKey (plain)
//!   │ ServerboundClientKey (RSA) ──────────────────►│
//!   │ ◄──────────────────── UnboundHandshakeOk (AES)│
//!   │ UnboundHandshakeOk + "-modified" (AES) ──────►│
//!   │                                               │
//!   │ ServerboundCreateUser / ServerboundLogin ────►│
//!   │ ◄─────────────────── ClientboundLoginResult   │
//!   │                                               │
//!   │ ServerboundDisconnect ───────────────────────►│
//!   │ ◄─────────────────── ClientboundDisconnect    │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Identifiers are wire format. Never rename one in place.
//! - `DisconnectReason` ordinals are wire format too; append only.
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::{BufMut, Bytes, BytesMut};
use hscsms_common::Identifier;
use rsa::RsaPublicKey;

use crate::crypto::asymmetric::public_key_der;
use crate::crypto::{AsymmetricProfile, SymmetricKey};
use crate::error::{CoreError, Result};
use crate::protocol::codec::{get_bool, get_i32, get_utf, put_bool, put_utf};
use crate::protocol::packet::ProtocolPacket;

// ============================================
// DisconnectReason
// ============================================

/// Why the server is ending a connection.
///
/// # Wire Format
/// Sent as a big-endian i32 ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DisconnectReason {
    /// Orderly close (server shutdown or client request).
    Close = 0,
    /// Removed for misbehaviour (failed handshake, server full).
    Kick = 1,
    /// Account or session destroyed.
    Destroy = 2,
}

impl DisconnectReason {
    /// Converts a wire ordinal to a reason.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Close),
            1 => Some(Self::Kick),
            2 => Some(Self::Destroy),
            _ => None,
        }
    }

    /// Returns the wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for DisconnectReason {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_i32(value)
            .ok_or_else(|| CoreError::malformed(format!("unknown disconnect reason {value}")))
    }
}

impl From<DisconnectReason> for i32 {
    fn from(reason: DisconnectReason) -> Self {
        reason.as_i32()
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Close => write!(f, "CLOSE"),
            Self::Kick => write!(f, "KICK"),
            Self::Destroy => write!(f, "DESTROY"),
        }
    }
}

// ============================================
// Handshake Packets
// ============================================

/// Server → client: the server's top-level RSA public key.
///
/// # Wire Format
/// ```text
/// utf  public_key   base64(DER SubjectPublicKeyInfo)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundPublicKey {
    /// The announced key.
    pub public_key: RsaPublicKey,
}

impl ClientboundPublicKey {
    /// Announces the public half of `profile`.
    #[must_use]
    pub fn new(profile: &AsymmetricProfile) -> Self {
        Self {
            public_key: profile.public_key().clone(),
        }
    }

    /// Returns an encrypt-only profile for the announced key.
    #[must_use]
    pub fn profile(&self) -> AsymmetricProfile {
        AsymmetricProfile::from_public_key(self.public_key.clone())
    }
}

impl ProtocolPacket for ClientboundPublicKey {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/handshake/clientbound/pubkey");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, &BASE64.encode(public_key_der(&self.public_key)?))
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let profile = AsymmetricProfile::from_public_key_base64(&get_utf(buf)?)?;
        Ok(Self {
            public_key: profile.public_key().clone(),
        })
    }
}

/// Client → server: the session key, sent RSA-encrypted.
///
/// # Wire Format
/// ```text
/// utf  key   base64(16 raw AES key bytes)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundClientKey {
    /// The client's freshly generated session key.
    pub key: SymmetricKey,
}

impl ProtocolPacket for ServerboundClientKey {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/handshake/serverbound/clientkey");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, &self.key.encode())
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            key: SymmetricKey::decode(&get_utf(buf)?)?,
        })
    }
}

/// Appended by the client to the challenge before echoing it.
pub const VERIFICATION_SUFFIX: &str = "-modified";

/// Either direction: the verification challenge and its echo.
///
/// # Wire Format
/// ```text
/// utf  message
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundHandshakeOk {
    /// Challenge (server → client) or challenge plus suffix (client → server).
    pub message: String,
}

impl ProtocolPacket for UnboundHandshakeOk {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/handshake/unbound/ok");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, &self.message)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            message: get_utf(buf)?,
        })
    }
}

// ============================================
// Core Packets
// ============================================

/// Server → client: the connection is being ended.
///
/// # Wire Format
/// ```text
/// i32  reason   DisconnectReason ordinal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientboundDisconnect {
    /// Why.
    pub reason: DisconnectReason,
}

impl ProtocolPacket for ClientboundDisconnect {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/core/clientbound/disconnect");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_i32(self.reason.as_i32());
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            reason: DisconnectReason::try_from(get_i32(buf)?)?,
        })
    }
}

/// Client → server: the client is leaving. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerboundDisconnect;

impl ProtocolPacket for ServerboundDisconnect {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/core/serverbound/disconnect");

    fn encode(&self, _buf: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn decode(_buf: &mut Bytes) -> Result<Self> {
        Ok(Self)
    }
}

// ============================================
// Login Packets
// ============================================

/// Username/password pair shared by the two login requests.
///
/// # Wire Format
/// ```text
/// utf  username
/// utf  password
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plaintext password (only ever sent encrypted).
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, &self.username)?;
        put_utf(buf, &self.password)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            username: get_utf(buf)?,
            password: get_utf(buf)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Client → server: create an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundCreateUser(pub Credentials);

impl ProtocolPacket for ServerboundCreateUser {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/login/serverbound/createuser");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.0.encode(buf)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Credentials::decode(buf).map(Self)
    }
}

/// Client → server: log in to an existing account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundLogin(pub Credentials);

impl ProtocolPacket for ServerboundLogin {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/login/serverbound/login");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.0.encode(buf)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Credentials::decode(buf).map(Self)
    }
}

/// Server → client: outcome of a create-user or login request.
///
/// # Wire Format
/// ```text
/// bool success
/// utf  detail   user id on success, failure reason otherwise
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundLoginResult {
    /// Whether the request succeeded.
    pub success: bool,
    /// User id or failure reason.
    pub detail: String,
}

impl ClientboundLoginResult {
    /// Successful result carrying the user id.
    pub fn ok(user_id: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: user_id.into(),
        }
    }

    /// Failed result carrying the reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: reason.into(),
        }
    }
}

impl ProtocolPacket for ClientboundLoginResult {
    const IDENTIFIER: Identifier = Identifier::new("hscsms/login/clientbound/result");

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        put_bool(buf, self.success);
        put_utf(buf, &self.detail)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            success: get_bool(buf)?,
            detail: get_utf(buf)?,
        })
    }
}

// ============================================
// Tests
// ============================================
