// ============================================
// File: crates/hscsms-transport/src/lib.rs
// ============================================
//! # hscsms Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Provides the TCP side of hscsms: binding and dialling sockets, moving
//! length-prefixed frames, and running one worker per connection that
//! feeds decoded packets into the connection's dispatch tree.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`listener`]: TCP listener binding and outbound connect
//! - [`frame`]: Async frame reads, packet ↔ frame conversion
//! - [`connection`]: The connection worker
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        hscsms-server          hscsms-client         │
//! │               │                     │               │
//! │               └──────────┬──────────┘               │
//! │                          ▼                          │
//! │                   hscsms-transport ◄── You are here │
//! │                          │                          │
//! │                          ▼                          │
//! │                     hscsms-core                     │
//! │                          │                          │
//! │                          ▼                          │
//! │                    hscsms-common                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    TCP stream                            │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                       │
//! │            │     read_frame      │                       │
//! │            │ (flag, hash, body)  │                       │
//! │            └──────────┬──────────┘                       │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                       │
//! │            │    decode_frame     │                       │
//! │            │ (registry, decrypt) │                       │
//! │            └──────────┬──────────┘                       │
//! │                       │                                  │
//! │            ┌──────────┴──────────┐                       │
//! │            │   dispatch tree     │                       │
//! │            │  (HandlerNode)      │                       │
//! │            └─────────────────────┘                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All sockets are Tokio sockets; call everything from a runtime
//! - A connection never reconnects by itself
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod error;
pub mod frame;
pub mod listener;

// Re-export primary types
pub use connection::{Connection, ConnectionConfig, DisconnectCallback};
pub use error::{Result, TransportError};
pub use listener::TcpAcceptor;
