// ============================================
// File: crates/hscsms-client/src/lib.rs
// ============================================
//! # hscsms Client Library
//!
//! ## Creation Reason
//! Provides the client side of hscsms: connect to a server, complete the
//! RSA/AES handshake, then create accounts and log in over the encrypted
//! channel.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`session`]: `ClientSession` (connect, requests, reconnect)
//! - [`handshake`]: Client half of the key exchange
//! - [`error`]: Client-specific error types
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use hscsms_client::ClientSession;
//! use hscsms_core::protocol::protocol_registry;
//! use hscsms_transport::ConnectionConfig;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(protocol_registry()?);
//! let session = ClientSession::connect(
//!     "127.0.0.1:5050".parse()?,
//!     registry,
//!     ConnectionConfig::default(),
//! )
//! .await?;
//! session.wait_ready().await?;
//! let user_id = session.login("alice", "s3cret").await?;
//! println!("logged in as {user_id}");
//! session.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Requests fail with `NotReady` until `wait_ready` has returned
//! - A server restart changes its key; `reconnect` runs a new handshake
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handshake;
pub mod session;

// Re-export primary types
pub use error::{ClientError, Result};
pub use handshake::{ClientHandshake, ClientHandshakeState, HandshakeStatus};
pub use session::ClientSession;
