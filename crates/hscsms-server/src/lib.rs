// ============================================
// File: crates/hscsms-server/src/lib.rs
// ============================================
//! # hscsms Server Library
//!
//! ## Creation Reason
//! Provides the hscsms server: accepts TCP clients, runs the RSA/AES
//! handshake with each, then serves account creation and login over the
//! encrypted channel.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Accept loop and client table
//! - [`services`]: Per-client protocol logic
//!   - [`services::client`]: Sending and disconnecting
//!   - [`services::handshake`]: Key exchange state machine
//!   - [`services::login`]: Create-user and login handlers
//!   - [`services::users`]: Account store
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        hscsms Server                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Server    │────►│  ServerClient   │    │
//! │  │             │     │ accept loop │     │  (per client)   │    │
//! │  └─────────────┘     └─────────────┘     └────────┬────────┘    │
//! │                                                   │             │
//! │                          ┌────────────────────────┼──────┐      │
//! │                          ▼                        ▼      │      │
//! │                   ┌─────────────┐         ┌────────────┐ │      │
//! │                   │  Handshake  │────────►│   Login    │ │      │
//! │                   └─────────────┘  ready  └─────┬──────┘ │      │
//! │                                                 ▼        │      │
//! │                                          ┌────────────┐  │      │
//! │                                          │ UserStore  │  │      │
//! │                                          └────────────┘  │      │
//! ├──────────────────────────────────────────────────────────┴──────┤
//! │                     hscsms-transport                            │
//! │        TcpAcceptor · Connection (read task + send queue)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Shutdown sends `CLOSE` to every client before the loop exits
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
pub use services::{InMemoryUserStore, ServerClient, UserStore};
