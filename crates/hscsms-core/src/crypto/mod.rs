// ============================================
// File: crates/hscsms-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the cipher profiles used by the hscsms handshake and by
//! encrypted frames, using RustCrypto implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`profile`]: The `CipherProfile` trait shared by both profile kinds
//! - [`asymmetric`]: RSA with PKCS#1 v1.5 padding (top-level server key)
//! - [`symmetric`]: AES-128/ECB/PKCS#7 (per-connection session key)
//! - [`chunked`]: Streams that push arbitrary-length data through a
//!   block-limited cipher
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Client                                        Server       │
//! │    │                                              │         │
//! │    │ ◄──────────────────── RSA public key (plain) │         │
//! │    │                                              │         │
//! │    │  AES key, RSA-chunked ──────────────────────►│         │
//! │    │                                              │         │
//! │    │ ◄──────────────── challenge, AES encrypted   │         │
//! │    │  challenge + "-modified", AES encrypted ────►│         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Session Phase                            │
//! │                                                             │
//! │   serialized packet ──► AES-128/ECB/PKCS#7 ──► frame body   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Confidentiality** only. There is no integrity tag, no replay
//!   protection and no forward secrecy. ECB leaks equal plaintext blocks.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Peers interoperate only if both sides use exactly these modes.
//!   Swapping in an AEAD here is a protocol change, not a refactor.
//! - ALL secret keys implement Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod asymmetric;
pub mod chunked;
pub mod profile;
pub mod symmetric;

// Re-export primary types at module level
pub use asymmetric::AsymmetricProfile;
pub use chunked::{decrypt_chunked, encrypt_chunked, ChunkedDecryptor, ChunkedEncryptor};
pub use profile::{CipherKind, CipherProfile};
pub use symmetric::{SymmetricKey, SymmetricProfile};

use sha2::{Digest, Sha256};

// ============================================
// Constants
// ============================================

/// Default RSA modulus length in bits for the top-level key pair.
pub const DEFAULT_RSA_KEY_BITS: usize = 1024;

/// Bytes of PKCS#1 v1.5 encryption padding overhead per RSA block.
pub const PKCS1_PADDING_OVERHEAD: usize = 11;

/// Plaintext bytes per block for 1024-bit RSA with PKCS#1 v1.5 padding.
pub const RSA_1024_UNPADDED_BLOCK_SIZE: usize = 117;

/// Ciphertext bytes per block for 1024-bit RSA.
pub const RSA_1024_PADDED_BLOCK_SIZE: usize = 128;

/// AES-128 key size in bytes.
pub const AES_128_KEY_SIZE: usize = 16;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

// ============================================
// Fingerprints
// ============================================

/// Returns a short hex fingerprint of public key bytes, safe for logs.
///
/// The fingerprint is the first 8 bytes of SHA-256 over the input.
#[must_use]
pub fn fingerprint(public_key_der: &[u8]) -> String {
    let digest = Sha256::digest(public_key_der);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_1024_constants_agree() {
        assert_eq!(
            RSA_1024_PADDED_BLOCK_SIZE - PKCS1_PADDING_OVERHEAD,
            RSA_1024_UNPADDED_BLOCK_SIZE
        );
        assert_eq!(RSA_1024_PADDED_BLOCK_SIZE * 8, DEFAULT_RSA_KEY_BITS);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint(b"key bytes");
        assert_eq!(a.len(), 16);
        assert_eq!(a, fingerprint(b"key bytes"));
        assert_ne!(a, fingerprint(b"other key bytes"));
    }
}
