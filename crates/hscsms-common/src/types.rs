// ============================================
// File: crates/hscsms-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the small value types every other crate keys things by:
//! protocol identifiers and connection ids.
//!
//! ## Main Functionality
//! - `Identifier`: Stable string name plus its 32-bit hash
//! - `ConnectionId`: Process-unique id for an accepted or dialled connection
//!
//! ## Identifier Hashing
//! ```text
//! "hscsms/handshake/unbound/ok"
//!        │
//!        ▼  FNV-1a (32-bit) over UTF-8 bytes
//! 0x????????  ── written on the wire as a big-endian u32
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The hash is part of the wire format. Changing the algorithm breaks
//!   every deployed peer.
//! - A 32-bit hash can collide. Registries must keep the canonical name
//!   next to the hash and refuse a colliding registration.
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================
// Constants
// ============================================

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

// ============================================
// Identifier
// ============================================

/// A stable name for a protocol entity together with its 32-bit hash.
///
/// The hash is computed at compile time when the name is a constant,
/// so identifiers can live in associated constants.
///
/// # Example
/// ```
/// use hscsms_common::Identifier;
///
/// const OK: Identifier = Identifier::new("hscsms/handshake/unbound/ok");
/// assert_eq!(OK.name(), "hscsms/handshake/unbound/ok");
/// assert_eq!(OK.hash(), Identifier::hash_of("hscsms/handshake/unbound/ok"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
    name: &'static str,
    hash: u32,
}

impl Identifier {
    /// Creates an identifier, hashing the name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            hash: Self::hash_of(name),
        }
    }

    /// Computes the 32-bit FNV-1a hash of a name.
    #[must_use]
    pub const fn hash_of(name: &str) -> u32 {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        hash
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the 32-bit hash.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({} #{:08x})", self.name, self.hash)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================
// ConnectionId
// ============================================

/// Process-unique identifier of a connection.
///
/// Ids are allocated from a global counter and never reused within a
/// process, which makes them safe as map keys after a peer disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        // Published FNV-1a test vectors.
        assert_eq!(Identifier::hash_of(""), 0x811c_9dc5);
        assert_eq!(Identifier::hash_of("a"), 0xe40c_292c);
        assert_eq!(Identifier::hash_of("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_identifier_const() {
        const ID: Identifier = Identifier::new("hscsms/core/serverbound/disconnect");
        assert_eq!(ID.name(), "hscsms/core/serverbound/disconnect");
        assert_eq!(ID.hash(), Identifier::hash_of(ID.name()));
        assert_eq!(ID.to_string(), "hscsms/core/serverbound/disconnect");
    }

    #[test]
    fn test_identifier_distinct_names() {
        let a = Identifier::new("hscsms/login/serverbound/createuser");
        let b = Identifier::new("hscsms/login/serverbound/login");
        assert_ne!(a, b);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
