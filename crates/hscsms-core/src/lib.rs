// ============================================
// File: crates/hscsms-core/src/lib.rs
// ============================================
//! # hscsms Core - Protocol, Cryptography & Dispatch Library
//!
//! ## Creation Reason
//! Provides everything about a connection that is independent of sockets:
//! how packets are identified and encoded, how they are encrypted, and
//! how a decoded packet finds its handlers.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - `CipherProfile` trait with asymmetric (RSA) and symmetric (AES) kinds
//! - Chunked cipher streams for block-limited ciphers
//!
//! ### Protocol Module ([`protocol`])
//! - Frame header and field codec
//! - `PacketType` / `Packet` / `PacketRegistry`
//! - The concrete packet set and `load_protocol`
//!
//! ### Dispatch Module ([`dispatch`])
//! - `HandlerNode` tree with typed fast-path and predicate children
//! - One-shot (self-removing) handlers
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        hscsms-server          hscsms-client         │
//! │               │                     │               │
//! │               └──────────┬──────────┘               │
//! │                          ▼                          │
//! │                   hscsms-transport                  │
//! │                          │                          │
//! │                          ▼                          │
//! │                     hscsms-core  ◄── You are here   │
//! │                          │                          │
//! │                          ▼                          │
//! │                    hscsms-common                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Confidentiality** only: RSA for the key exchange, AES-128 for the
//!   session. No integrity, replay protection or forward secrecy.
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses RustCrypto implementations
//! - ALL secret keys MUST implement Zeroize
//! - Protocol changes break every deployed peer
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{AsymmetricProfile, CipherKind, CipherProfile, SymmetricKey, SymmetricProfile};
pub use dispatch::{ChainAction, HandlerNode, HandlerResult, NodeAction};
pub use error::{CoreError, Result};
pub use protocol::{load_protocol, Packet, PacketRegistry, PacketType, ProtocolPacket};
