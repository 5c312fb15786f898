// ============================================
// File: crates/hscsms-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types specific to cipher profiles, packet encoding and
//! the packet type registry in the hscsms core crate.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: Key generation, key decoding, encryption failures
//! 2. **Protocol Errors**: Packet parsing, unknown types, oversized fields
//! 3. **Registry Errors**: Duplicate registrations and hash collisions
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Decryption failures stay opaque on purpose: a padding oracle is
//!   still an oracle even on a confidentiality-only channel
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use hscsms_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Failed to generate cryptographic key.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// Key bytes could not be decoded from their transport form.
    #[error("Invalid {kind} key: {reason}")]
    InvalidKey {
        /// Which key half or kind
        kind: &'static str,
        /// Why decoding failed
        reason: String,
    },

    /// The profile does not hold the key needed for this role.
    #[error("Missing {role} key")]
    MissingKey {
        /// `"public"`, `"private"` or `"secret"`
        role: &'static str,
    },

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Decryption operation failed (bad key, corrupt data or bad padding).
    #[error("Decryption failed")]
    Decryption,

    /// Input exceeds what one cipher block can carry.
    #[error("Block too large: max {max} bytes, got {actual}")]
    BlockTooLarge {
        /// Maximum plaintext bytes per block
        max: usize,
        /// Actual input length
        actual: usize,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Frame referenced a type hash that is not registered.
    #[error("Unknown packet type: 0x{0:08x}")]
    UnknownPacketType(u32),

    /// Packet body is malformed.
    #[error("Malformed packet: {reason}")]
    MalformedMessage {
        /// What's wrong with the packet
        reason: String,
    },

    /// Packet body ended before a field was complete.
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length remaining
        actual: usize,
    },

    /// A field or frame exceeds the maximum allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size
        actual: usize,
    },

    /// A serializer was handed a packet of a different kind.
    #[error("Packet type mismatch: expected {expected}, got {actual}")]
    PacketTypeMismatch {
        /// Identifier the serializer handles
        expected: &'static str,
        /// Identifier of the packet it received
        actual: &'static str,
    },

    // ========================================
    // Registry Errors
    // ========================================

    /// The identifier was already registered.
    #[error("Packet type '{identifier}' is already registered")]
    DuplicatePacketType {
        /// Identifier name
        identifier: &'static str,
    },

    /// Two distinct identifiers hash to the same value.
    #[error("Identifier hash collision 0x{hash:08x}: '{existing}' vs '{incoming}'")]
    HashCollision {
        /// The shared hash
        hash: u32,
        /// Identifier already registered
        existing: &'static str,
        /// Identifier being registered
        incoming: &'static str,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            kind,
            reason: reason.into(),
        }
    }

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates a `MessageTooLarge` error.
    #[must_use]
    pub const fn too_large(max: usize, actual: usize) -> Self {
        Self::MessageTooLarge { max, actual }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGeneration { .. }
                | Self::InvalidKey { .. }
                | Self::MissingKey { .. }
                | Self::Encryption { .. }
                | Self::Decryption
                | Self::BlockTooLarge { .. }
        )
    }

    /// Returns `true` if this is a protocol error.
    ///
    /// Protocol errors indicate malformed or unexpected packets.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPacketType(_)
                | Self::MalformedMessage { .. }
                | Self::MessageTooShort { .. }
                | Self::MessageTooLarge { .. }
                | Self::PacketTypeMismatch { .. }
        )
    }

    /// Returns `true` if this error happened while building the registry.
    #[must_use]
    pub const fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePacketType { .. } | Self::HashCollision { .. }
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::too_short(4, 1);
        assert!(err.to_string().contains('4'));
        assert!(err.to_string().contains('1'));

        let err = CoreError::UnknownPacketType(0xdead_beef);
        assert!(err.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::Decryption.is_crypto_error());
        assert!(!CoreError::Decryption.is_protocol_error());

        assert!(CoreError::malformed("bad ordinal").is_protocol_error());

        let collision = CoreError::HashCollision {
            hash: 1,
            existing: "a",
            incoming: "b",
        };
        assert!(collision.is_registry_error());
        assert!(!collision.is_crypto_error());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_state("idle", "started");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
