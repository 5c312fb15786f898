// ============================================
// File: crates/hscsms-core/src/crypto/symmetric.rs
// ============================================
//! # Symmetric Cipher Profile
//!
//! ## Creation Reason
//! After the key exchange every frame that asks for encryption is sealed
//! with a per-connection AES-128 key. This module owns that key and the
//! whole-buffer AES operations.
//!
//! ## Main Functionality
//! - `SymmetricKey`: 16-byte secret, zeroized on drop, redacted in Debug
//! - `SymmetricProfile`: AES-128/ECB/PKCS#7 over a `SymmetricKey`
//!
//! ## Block Sizes
//! The cipher itself accepts any length in one call. For the chunked
//! streams it reports 15 plaintext bytes per 16-byte block, which is
//! exactly what PKCS#7 produces for a short final block.
//!
//! ## ⚠️ Important Note for Next Developer
//! - ECB is kept for wire compatibility. It leaks repeated 16-byte blocks.
//! - Never log `SymmetricKey::encode` output
//!
//! ## Last Modified
//! v0.1.0 - Initial AES profile

use std::fmt;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::profile::{CipherKind, CipherProfile};
use crate::crypto::{AES_128_KEY_SIZE, AES_BLOCK_SIZE};
use crate::error::{CoreError, Result};

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

// ============================================
// SymmetricKey
// ============================================

/// AES-128 secret key.
///
/// # Security
/// - Zeroed on drop
/// - Debug output is redacted
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; AES_128_KEY_SIZE]);

impl SymmetricKey {
    /// Generates a random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_128_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AES_128_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a slice, checking its length.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the slice is not 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; AES_128_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(
                "secret",
                format!("expected {AES_128_KEY_SIZE} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self(array))
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Do not copy these bytes into long-lived buffers.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; AES_128_KEY_SIZE] {
        &self.0
    }

    /// Encodes the key to its base64 transport form.
    #[must_use]
    pub fn encode(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Decodes a key from its base64 transport form.
    ///
    /// # Errors
    /// Returns `InvalidKey` on bad base64 or wrong length.
    pub fn decode(encoded: &str) -> Result<Self> {
        let mut bytes = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::invalid_key("secret", e.to_string()))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        // Not constant time.
        self.0 == other.0
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

// ============================================
// SymmetricProfile
// ============================================

/// AES-128/ECB/PKCS#7 profile; the same key encrypts and decrypts.
///
/// # Example
/// ```
/// use hscsms_core::crypto::{CipherProfile, SymmetricProfile};
///
/// let profile = SymmetricProfile::generate();
/// let sealed = profile.encrypt_big(b"hello")?;
/// assert_eq!(sealed.len(), 16);
/// assert_eq!(profile.decrypt_big(&sealed)?, b"hello");
/// # Ok::<(), hscsms_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct SymmetricProfile {
    key: SymmetricKey,
}

impl SymmetricProfile {
    /// Creates a profile with a freshly generated key.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_key(SymmetricKey::generate())
    }

    /// Creates a profile around an existing key.
    #[must_use]
    pub const fn with_key(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl CipherProfile for SymmetricProfile {
    fn kind(&self) -> CipherKind {
        CipherKind::Symmetric
    }

    fn transformation(&self) -> &'static str {
        "AES-128/ECB/PKCS7"
    }

    fn unpadded_block_size(&self) -> usize {
        AES_BLOCK_SIZE - 1
    }

    fn padded_block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128EcbEnc::new_from_slice(self.key.as_bytes())
            .map_err(|e| CoreError::encryption(format!("AES key setup: {e}")))?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(CoreError::Decryption);
        }
        let cipher =
            Aes128EcbDec::new_from_slice(self.key.as_bytes()).map_err(|_| CoreError::Decryption)?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CoreError::Decryption)
    }
}

impl fmt::Debug for SymmetricProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricProfile")
            .field("transformation", &self.transformation())
            .field("key", &self.key)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_lengths() {
        let profile = SymmetricProfile::generate();
        assert_eq!(profile.encrypt(b"").unwrap().len(), 16);
        assert_eq!(profile.encrypt(&[7u8; 15]).unwrap().len(), 16);
        assert_eq!(profile.encrypt(&[7u8; 16]).unwrap().len(), 32);
        assert_eq!(profile.encrypt(&[7u8; 1000]).unwrap().len(), 1008);
    }

    #[test]
    fn test_whole_buffer_roundtrip() {
        let profile = SymmetricProfile::generate();
        let data: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let sealed = profile.encrypt_big(&data).unwrap();
        assert_eq!(profile.decrypt_big(&sealed).unwrap(), data);
    }

    #[test]
    fn test_ecb_known_answer() {
        // FIPS-197 appendix C.1 key/plaintext; first block must match the
        // raw AES-128 output, the second block is the PKCS#7 pad block.
        let key = SymmetricKey::from_bytes([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ]);
        let plaintext = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];
        let profile = SymmetricProfile::with_key(key);
        let sealed = profile.encrypt(&plaintext).unwrap();
        assert_eq!(&sealed[..16], &expected);
        assert_eq!(sealed.len(), 32);
    }

    #[test]
    fn test_wrong_key_or_corruption_fails() {
        let a = SymmetricProfile::generate();
        let b = SymmetricProfile::generate();
        let sealed = a.encrypt(b"attack at dawn").unwrap();

        assert_ne!(
            b.decrypt(&sealed).ok().as_deref(),
            Some(&b"attack at dawn"[..])
        );
        assert!(matches!(a.decrypt(&sealed[..15]), Err(CoreError::Decryption)));
        assert!(matches!(a.decrypt(&[]), Err(CoreError::Decryption)));
    }

    #[test]
    fn test_key_transport_form() {
        let key = SymmetricKey::generate();
        let decoded = SymmetricKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);

        assert!(matches!(
            SymmetricKey::decode("AAAA"),
            Err(CoreError::InvalidKey { kind: "secret", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let profile = SymmetricProfile::generate();
        let debug = format!("{profile:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&profile.key().encode()));
    }
}
