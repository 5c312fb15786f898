// ============================================
// File: crates/hscsms-common/src/lib.rs
// ============================================
//! # hscsms Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides foundational types shared across all hscsms crates,
//! ensuring consistency and reducing code duplication.
//!
//! ## Main Functionality
//! - [`types`]: Core type definitions (`Identifier`, `ConnectionId`)
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        hscsms-server            hscsms-client       │
//! │              │                        │             │
//! │              └───────────┬────────────┘             │
//! │                          ▼                          │
//! │                   hscsms-transport                  │
//! │                          │                          │
//! │                          ▼                          │
//! │                     hscsms-core                     │
//! │                          │                          │
//! │                          ▼                          │
//! │                   hscsms-common  ◄── You are here   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dependencies
//! - No internal crate dependencies (leaf node)
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - `Identifier` hashing is part of the wire format
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{ConnectionId, Identifier};
