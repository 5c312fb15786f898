// ============================================
// File: crates/hscsms-core/src/crypto/asymmetric.rs
// ============================================
//! # Asymmetric Cipher Profile
//!
//! ## Creation Reason
//! The server announces an RSA public key in plaintext; the client uses
//! it to encrypt the session key it generates. This module owns that
//! key pair, its transport encoding, and block-level RSA operations.
//!
//! ## Main Functionality
//! - `AsymmetricProfile`: RSA key pair (or public half only)
//! - Key generation with a configurable modulus length
//! - Transport form: base64 of DER (SPKI for public, PKCS#8 for private)
//!
//! ## Block Sizes
//! ```text
//! modulus k bytes   unpadded = k - 11   padded = k
//! 1024-bit          117                 128
//! 2048-bit          245                 256
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A profile decoded from a peer's announcement only has the public
//!   half. `decrypt` on it is `MissingKey`, never a panic.
//! - Key generation is CPU heavy; call it off the async executor.
//!
//! ## Last Modified
//! v0.1.0 - Initial RSA profile

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::crypto::fingerprint;
use crate::crypto::profile::{CipherKind, CipherProfile};
use crate::crypto::PKCS1_PADDING_OVERHEAD;
use crate::error::{CoreError, Result};

// ============================================
// AsymmetricProfile
// ============================================

/// RSA profile with PKCS#1 v1.5 encryption padding.
///
/// # Roles
/// - Encryption uses the public key
/// - Decryption uses the private key
///
/// # Example
/// ```no_run
/// use hscsms_core::crypto::{AsymmetricProfile, CipherProfile};
///
/// let server = AsymmetricProfile::generate(1024)?;
/// let announced = server.encode_public_key()?;
///
/// let client = AsymmetricProfile::from_public_key_base64(&announced)?;
/// let sealed = client.encrypt_big(b"session key bytes")?;
/// assert_eq!(server.decrypt_big(&sealed)?, b"session key bytes");
/// # Ok::<(), hscsms_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct AsymmetricProfile {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
}

impl AsymmetricProfile {
    /// Generates a fresh key pair with a modulus of `bits` bits.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the RNG or prime search fails.
    pub fn generate(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CoreError::key_generation(format!("RSA-{bits}: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self {
            public,
            private: Some(private),
        })
    }

    /// Wraps an existing public key; the profile can only encrypt.
    #[must_use]
    pub fn from_public_key(public: RsaPublicKey) -> Self {
        Self {
            public,
            private: None,
        }
    }

    /// Wraps an existing private key, deriving its public half.
    #[must_use]
    pub fn from_private_key(private: RsaPrivateKey) -> Self {
        Self {
            public: RsaPublicKey::from(&private),
            private: Some(private),
        }
    }

    /// Decodes a public key from its base64 SPKI transport form.
    ///
    /// # Errors
    /// Returns `InvalidKey` on bad base64 or DER.
    pub fn from_public_key_base64(encoded: &str) -> Result<Self> {
        let der = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::invalid_key("public", e.to_string()))?;
        let public = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CoreError::invalid_key("public", e.to_string()))?;
        Ok(Self::from_public_key(public))
    }

    /// Decodes a private key from its base64 PKCS#8 transport form.
    ///
    /// # Errors
    /// Returns `InvalidKey` on bad base64 or DER.
    pub fn from_private_key_base64(encoded: &str) -> Result<Self> {
        let der = BASE64
            .decode(encoded)
            .map_err(|e| CoreError::invalid_key("private", e.to_string()))?;
        let private = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| CoreError::invalid_key("private", e.to_string()))?;
        Ok(Self::from_private_key(private))
    }

    /// Returns the public key.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Returns `true` if this profile can decrypt.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.private.is_some()
    }

    /// Returns the modulus length in bits.
    #[must_use]
    pub fn key_bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Returns the DER SubjectPublicKeyInfo encoding of the public key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if DER encoding fails.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        public_key_der(&self.public)
    }

    /// Encodes the public key to its base64 transport form.
    ///
    /// # Errors
    /// Returns `InvalidKey` if DER encoding fails.
    pub fn encode_public_key(&self) -> Result<String> {
        Ok(BASE64.encode(self.public_key_der()?))
    }

    /// Encodes the private key to its base64 PKCS#8 transport form.
    ///
    /// # Errors
    /// Returns `MissingKey` for a public-only profile.
    pub fn encode_private_key(&self) -> Result<String> {
        let private = self
            .private
            .as_ref()
            .ok_or(CoreError::MissingKey { role: "private" })?;
        let der = private
            .to_pkcs8_der()
            .map_err(|e| CoreError::invalid_key("private", e.to_string()))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Returns a short fingerprint of the public key for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.public_key_der()
            .map(|der| fingerprint(&der))
            .unwrap_or_else(|_| "unavailable".to_string())
    }
}

/// DER SPKI encoding of an RSA public key.
///
/// # Errors
/// Returns `InvalidKey` if encoding fails.
pub fn public_key_der(public: &RsaPublicKey) -> Result<Vec<u8>> {
    public
        .to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CoreError::invalid_key("public", e.to_string()))
}

impl CipherProfile for AsymmetricProfile {
    fn kind(&self) -> CipherKind {
        CipherKind::Asymmetric
    }

    fn transformation(&self) -> &'static str {
        "RSA/ECB/PKCS1v15"
    }

    fn unpadded_block_size(&self) -> usize {
        self.public.size() - PKCS1_PADDING_OVERHEAD
    }

    fn padded_block_size(&self) -> usize {
        self.public.size()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let max = self.unpadded_block_size();
        if plaintext.len() > max {
            return Err(CoreError::BlockTooLarge {
                max,
                actual: plaintext.len(),
            });
        }
        self.public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CoreError::encryption(format!("RSA block: {e}")))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private = self
            .private
            .as_ref()
            .ok_or(CoreError::MissingKey { role: "private" })?;
        private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| CoreError::Decryption)
    }
}

impl fmt::Debug for AsymmetricProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("AsymmetricProfile")
            .field("bits", &self.key_bits())
            .field("fingerprint", &self.fingerprint())
            .field("private", &self.has_private_key())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{RSA_1024_PADDED_BLOCK_SIZE, RSA_1024_UNPADDED_BLOCK_SIZE};

    fn test_profile() -> AsymmetricProfile {
        AsymmetricProfile::generate(1024).unwrap()
    }

    #[test]
    fn test_block_sizes_for_1024_bits() {
        let profile = test_profile();
        assert_eq!(profile.key_bits(), 1024);
        assert_eq!(profile.unpadded_block_size(), RSA_1024_UNPADDED_BLOCK_SIZE);
        assert_eq!(profile.padded_block_size(), RSA_1024_PADDED_BLOCK_SIZE);
    }

    #[test]
    fn test_single_block_roundtrip() {
        let profile = test_profile();
        let ciphertext = profile.encrypt(b"hello").unwrap();
        assert_eq!(ciphertext.len(), RSA_1024_PADDED_BLOCK_SIZE);
        assert_eq!(profile.decrypt(&ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn test_oversized_block_rejected() {
        let profile = test_profile();
        let data = vec![0u8; RSA_1024_UNPADDED_BLOCK_SIZE + 1];
        assert!(matches!(
            profile.encrypt(&data),
            Err(CoreError::BlockTooLarge { max: 117, actual: 118 })
        ));
    }

    #[test]
    fn test_public_only_profile_cannot_decrypt() {
        let server = test_profile();
        let client =
            AsymmetricProfile::from_public_key_base64(&server.encode_public_key().unwrap())
                .unwrap();
        assert!(!client.has_private_key());

        let ciphertext = client.encrypt(b"secret").unwrap();
        assert!(matches!(
            client.decrypt(&ciphertext),
            Err(CoreError::MissingKey { role: "private" })
        ));
        assert_eq!(server.decrypt(&ciphertext).unwrap(), b"secret");
    }

    #[test]
    fn test_private_key_transport_form() {
        let profile = test_profile();
        let encoded = profile.encode_private_key().unwrap();
        let restored = AsymmetricProfile::from_private_key_base64(&encoded).unwrap();
        assert_eq!(restored.public_key(), profile.public_key());
        assert_eq!(restored.fingerprint(), profile.fingerprint());
    }

    #[test]
    fn test_invalid_public_key_rejected() {
        assert!(matches!(
            AsymmetricProfile::from_public_key_base64("AAAA"),
            Err(CoreError::InvalidKey { kind: "public", .. })
        ));
        assert!(AsymmetricProfile::from_public_key_base64("%%%").is_err());
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let a = test_profile();
        let b = test_profile();
        let ciphertext = a.encrypt(b"for a only").unwrap();
        assert_ne!(
            b.decrypt(&ciphertext).ok().as_deref(),
            Some(&b"for a only"[..])
        );
    }

    #[test]
    fn test_debug_hides_private_key() {
        let profile = test_profile();
        let debug = format!("{profile:?}");
        assert!(debug.contains("AsymmetricProfile"));
        assert!(debug.contains("1024"));
        assert!(debug.contains("private: true"));
        assert!(!debug.contains(&profile.encode_private_key().unwrap()));
    }
}
