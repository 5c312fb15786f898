// ============================================
// File: crates/hscsms-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Per-client protocol logic for the hscsms server, kept apart from the
//! accept loop and from the transport.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`client`]: `ServerClient`, sending and disconnecting
//! - [`handshake`]: Server half of the key exchange
//! - [`login`]: Create-user and login handlers
//! - [`users`]: `UserStore` seam and in-memory store
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Per-Client Tree                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  root                                                       │
//! │   ├── ServerboundDisconnect      close, HALT     (keep)     │
//! │   ├── ServerboundClientKey       handshake       (one-shot) │
//! │   ├── UnboundHandshakeOk         handshake       (one-shot) │
//! │   │        │ verified                                       │
//! │   │        ▼                                                │
//! │   ├── ServerboundCreateUser      UserStore       (keep)     │
//! │   └── ServerboundLogin           UserStore       (keep)     │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run on the connection's read task; keep them short
//! - Login handlers exist only after the handshake is verified
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod client;
pub mod handshake;
pub mod login;
pub mod users;

// Re-export primary types
pub use client::ServerClient;
pub use handshake::{ServerHandshake, ServerHandshakeState};
pub use users::{InMemoryUserStore, UserId, UserStore, UserStoreError};
