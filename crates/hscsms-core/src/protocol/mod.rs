// ============================================
// File: crates/hscsms-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the hscsms wire protocol: how frames are laid out, how packet
//! kinds are identified, and the fixed set of packets both ends speak.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`codec`]: Frame header and field encoders
//! - [`packet`]: `ProtocolPacket`, `PacketType`, `Packet`
//! - [`registry`]: Hash/name → `PacketType` lookup
//! - [`messages`]: The concrete packet kinds
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │                                                             │
//! │  Client ◄──────── ClientboundPublicKey (plain) ──── Server  │
//! │  Client ───────── ServerboundClientKey (RSA) ─────► Server  │
//! │  Client ◄──────── UnboundHandshakeOk (AES) ──────── Server  │
//! │  Client ───────── UnboundHandshakeOk (AES) ───────► Server  │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Session Phase                            │
//! │                                                             │
//! │  Client ══════ login / disconnect packets (AES) ════ Server │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - Big-endian byte order for multi-byte integers
//! - Every frame is length-prefixed
//! - The encrypted flag is per frame, not per connection
//!
//! ## ⚠️ Important Note for Next Developer
//! - Register new packets in [`load_protocol`] on both ends
//! - Test vectors should be maintained for all message types
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;
pub mod packet;
pub mod registry;

// Re-export primary types
pub use codec::{FrameHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
pub use messages::{
    ClientboundDisconnect, ClientboundLoginResult, ClientboundPublicKey, Credentials,
    DisconnectReason, ServerboundClientKey, ServerboundCreateUser, ServerboundDisconnect,
    ServerboundLogin, UnboundHandshakeOk, VERIFICATION_SUFFIX,
};
pub use packet::{Packet, PacketType, ProtocolPacket};
pub use registry::PacketRegistry;

use crate::error::Result;

/// Registers the full hscsms packet set.
///
/// # Errors
/// Fails if any of these types is already registered.
pub fn load_protocol(registry: &mut PacketRegistry) -> Result<()> {
    registry.register_packet::<ClientboundPublicKey>()?;
    registry.register_packet::<ServerboundClientKey>()?;
    registry.register_packet::<UnboundHandshakeOk>()?;
    registry.register_packet::<ClientboundDisconnect>()?;
    registry.register_packet::<ServerboundDisconnect>()?;
    registry.register_packet::<ServerboundCreateUser>()?;
    registry.register_packet::<ServerboundLogin>()?;
    registry.register_packet::<ClientboundLoginResult>()?;
    Ok(())
}

/// Returns a fresh registry holding the full packet set.
///
/// # Errors
/// See [`load_protocol`].
pub fn protocol_registry() -> Result<PacketRegistry> {
    let mut registry = PacketRegistry::new();
    load_protocol(&mut registry)?;
    Ok(registry)
}
