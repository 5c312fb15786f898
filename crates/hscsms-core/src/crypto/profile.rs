// ============================================
// File: crates/hscsms-core/src/crypto/profile.rs
// ============================================
//! # Cipher Profile Trait
//!
//! ## Creation Reason
//! Connections and the handshake only need "something that encrypts and
//! decrypts". This trait is that seam, so a connection can hold either
//! profile kind behind an `Arc<dyn CipherProfile>`.
//!
//! ## Big-Data Selection
//! ```text
//! encrypt_big(data)
//!     │
//!     ├── Asymmetric ──► chunked: split into unpadded blocks, encrypt each
//!     │
//!     └── Symmetric  ──► whole buffer in one padded encrypt call
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial profile trait

use std::fmt;

use crate::crypto::chunked::{decrypt_chunked, encrypt_chunked};
use crate::error::Result;

// ============================================
// CipherKind
// ============================================

/// The two profile families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    /// Key pair: encrypt with the public half, decrypt with the private half.
    Asymmetric,
    /// One shared secret used in both directions.
    Symmetric,
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asymmetric => write!(f, "asymmetric"),
            Self::Symmetric => write!(f, "symmetric"),
        }
    }
}

// ============================================
// CipherProfile Trait
// ============================================

/// A bundle of algorithm, key material and block-size parameters.
///
/// # Block Sizes
/// `unpadded_block_size` is the most plaintext one `encrypt` call can
/// take when the cipher is block-limited; `padded_block_size` is the size
/// of the ciphertext one such block becomes. The chunked streams rely on
/// both being fixed for the lifetime of the profile.
pub trait CipherProfile: Send + Sync + fmt::Debug {
    /// Returns the profile family.
    fn kind(&self) -> CipherKind;

    /// Returns the algorithm/mode/padding transformation, for logs.
    fn transformation(&self) -> &'static str;

    /// Maximum plaintext bytes per cipher block.
    fn unpadded_block_size(&self) -> usize;

    /// Ciphertext bytes produced per cipher block.
    fn padded_block_size(&self) -> usize;

    /// Encrypts one buffer in a single cipher call.
    ///
    /// # Errors
    /// Fails if the key needed for encryption is absent, or if the
    /// input is larger than the cipher accepts in one call.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts one buffer in a single cipher call.
    ///
    /// # Errors
    /// Fails with `Decryption` on a wrong key, corrupt data or bad padding.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypts arbitrary-length data, chunked or whole-buffer by kind.
    ///
    /// # Errors
    /// Propagates any block encryption failure.
    fn encrypt_big(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.kind() {
            CipherKind::Asymmetric => encrypt_chunked(self, data),
            CipherKind::Symmetric => self.encrypt(data),
        }
    }

    /// Reverses [`CipherProfile::encrypt_big`].
    ///
    /// # Errors
    /// Propagates any block decryption failure, and rejects chunked
    /// ciphertext that is not a whole number of blocks.
    fn decrypt_big(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.kind() {
            CipherKind::Asymmetric => decrypt_chunked(self, data),
            CipherKind::Symmetric => self.decrypt(data),
        }
    }
}
