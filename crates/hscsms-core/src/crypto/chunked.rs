// ============================================
// File: crates/hscsms-core/src/crypto/chunked.rs
// ============================================
//! # Chunked Cipher Streams
//!
//! ## Creation Reason
//! RSA only transforms one block at a time, and its plaintext block is
//! smaller than its ciphertext block (117 → 128 bytes for 1024-bit keys).
//! Serialized packets are arbitrary length, so they are split on write
//! and reassembled on read.
//!
//! ## Main Functionality
//! - `ChunkedEncryptor`: `Write` adapter emitting one ciphertext block per
//!   full plaintext block, plus a short final block on flush
//! - `ChunkedDecryptor`: `Read` adapter consuming fixed ciphertext blocks
//! - `encrypt_chunked` / `decrypt_chunked`: whole-buffer helpers
//!
//! ## Layout
//! ```text
//! plaintext  |<-- 117 -->|<-- 117 -->|<- 40 ->|
//!                  │           │          │
//!                  ▼           ▼          ▼
//! ciphertext |<-- 128 -->|<-- 128 -->|<-- 128 -->|
//! ```
//! The ciphertext never says how long the final block was; the caller
//! carries the ciphertext length (frames always do).
//!
//! ## ⚠️ Important Note for Next Developer
//! - An empty payload produces zero ciphertext bytes, not an encrypted
//!   empty block
//! - `flush` ends the current payload; writing after it starts new blocks
//!
//! ## Last Modified
//! v0.1.0 - Initial chunked streams

use std::io::{self, Read, Write};

use hscsms_common::CommonError;

use crate::crypto::profile::CipherProfile;
use crate::error::{CoreError, Result};

// ============================================
// ChunkedEncryptor
// ============================================

/// `Write` adapter that encrypts in cipher-block-sized pieces.
///
/// # Example
/// ```no_run
/// use std::io::Write;
/// use hscsms_core::crypto::{AsymmetricProfile, ChunkedEncryptor};
///
/// let profile = AsymmetricProfile::generate(1024)?;
/// let mut writer = ChunkedEncryptor::new(&profile, Vec::new());
/// writer.write_all(&[1u8; 300])?;
/// let ciphertext = writer.finish()?;
/// assert_eq!(ciphertext.len(), 3 * 128);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ChunkedEncryptor<'p, P: CipherProfile + ?Sized, W: Write> {
    profile: &'p P,
    inner: W,
    buffer: Vec<u8>,
}

impl<'p, P: CipherProfile + ?Sized, W: Write> ChunkedEncryptor<'p, P, W> {
    /// Wraps `inner`, encrypting with `profile`.
    pub fn new(profile: &'p P, inner: W) -> Self {
        Self {
            buffer: Vec::with_capacity(profile.unpadded_block_size()),
            profile,
            inner,
        }
    }

    /// Flushes the final block and returns the inner writer.
    ///
    /// # Errors
    /// Propagates encryption or write failures.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn emit_block(&mut self) -> io::Result<()> {
        let block = self.profile.encrypt(&self.buffer).map_err(to_io_error)?;
        self.buffer.clear();
        self.inner.write_all(&block)
    }
}

impl<P: CipherProfile + ?Sized, W: Write> Write for ChunkedEncryptor<'_, P, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let block_size = self.profile.unpadded_block_size();
        let mut remaining = buf;
        while !remaining.is_empty() {
            let take = (block_size - self.buffer.len()).min(remaining.len());
            self.buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if self.buffer.len() == block_size {
                self.emit_block()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.emit_block()?;
        }
        self.inner.flush()
    }
}

// ============================================
// ChunkedDecryptor
// ============================================

/// `Read` adapter that decrypts fixed-size ciphertext blocks.
pub struct ChunkedDecryptor<'p, P: CipherProfile + ?Sized, R: Read> {
    profile: &'p P,
    inner: R,
    plain: Vec<u8>,
    position: usize,
}

impl<'p, P: CipherProfile + ?Sized, R: Read> ChunkedDecryptor<'p, P, R> {
    /// Wraps `inner`, decrypting with `profile`.
    pub fn new(profile: &'p P, inner: R) -> Self {
        Self {
            profile,
            inner,
            plain: Vec::new(),
            position: 0,
        }
    }

    /// Reads and decrypts the next block. Returns `false` at a clean EOF.
    fn refill(&mut self) -> io::Result<bool> {
        let mut block = vec![0u8; self.profile.padded_block_size()];
        let mut filled = 0;
        while filled < block.len() {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(false);
        }
        if filled < block.len() {
            return Err(to_io_error(CoreError::malformed(format!(
                "truncated cipher block: {filled} of {} bytes",
                block.len()
            ))));
        }

        self.plain = self.profile.decrypt(&block).map_err(to_io_error)?;
        self.position = 0;
        Ok(true)
    }
}

impl<P: CipherProfile + ?Sized, R: Read> Read for ChunkedDecryptor<'_, P, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // A block may legitimately decrypt to zero bytes; keep pulling.
        while self.position >= self.plain.len() {
            if !self.refill()? {
                return Ok(0);
            }
        }
        let available = &self.plain[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

// ============================================
// Whole-Buffer Helpers
// ============================================

/// Encrypts `data` block by block.
///
/// # Errors
/// Propagates block encryption failures.
pub fn encrypt_chunked<P: CipherProfile + ?Sized>(profile: &P, data: &[u8]) -> Result<Vec<u8>> {
    let blocks = data.len().div_ceil(profile.unpadded_block_size());
    let mut writer = ChunkedEncryptor::new(
        profile,
        Vec::with_capacity(blocks * profile.padded_block_size()),
    );
    writer.write_all(data).map_err(from_io_error)?;
    writer.finish().map_err(from_io_error)
}

/// Decrypts a whole number of ciphertext blocks.
///
/// # Errors
/// Returns `MalformedMessage` if `data` is not a multiple of the padded
/// block size, or `Decryption` if any block fails.
pub fn decrypt_chunked<P: CipherProfile + ?Sized>(profile: &P, data: &[u8]) -> Result<Vec<u8>> {
    let block_size = profile.padded_block_size();
    if data.len() % block_size != 0 {
        return Err(CoreError::malformed(format!(
            "ciphertext length {} is not a multiple of {block_size}",
            data.len()
        )));
    }
    let mut reader = ChunkedDecryptor::new(profile, data);
    let mut plain = Vec::with_capacity(data.len());
    reader.read_to_end(&mut plain).map_err(from_io_error)?;
    Ok(plain)
}

fn to_io_error(err: CoreError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn from_io_error(err: io::Error) -> CoreError {
    if err.get_ref().is_some_and(|inner| inner.is::<CoreError>()) {
        if let Some(inner) = err.into_inner() {
            if let Ok(core) = inner.downcast::<CoreError>() {
                return *core;
            }
        }
        return CoreError::malformed("chunked cipher stream failed");
    }
    CommonError::io("chunked cipher stream", err).into()
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::crypto::{AsymmetricProfile, SymmetricProfile};

    fn rsa() -> &'static AsymmetricProfile {
        static PROFILE: OnceLock<AsymmetricProfile> = OnceLock::new();
        PROFILE.get_or_init(|| AsymmetricProfile::generate(1024).unwrap())
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_rsa_chunked_boundaries() {
        let profile = rsa();
        let block = profile.unpadded_block_size();
        for len in [0, 1, block - 1, block, block + 1, 10 * block + 3] {
            let data = payload(len);
            let sealed = encrypt_chunked(profile, &data).unwrap();
            assert_eq!(
                sealed.len(),
                len.div_ceil(block) * profile.padded_block_size(),
                "ciphertext size for {len} bytes"
            );
            assert_eq!(decrypt_chunked(profile, &sealed).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn test_symmetric_profile_also_chunks() {
        let profile = SymmetricProfile::generate();
        let data = payload(100);
        let sealed = encrypt_chunked(&profile, &data).unwrap();
        assert_eq!(sealed.len(), 100usize.div_ceil(15) * 16);
        assert_eq!(decrypt_chunked(&profile, &sealed).unwrap(), data);
    }

    #[test]
    fn test_big_variants_select_by_kind() {
        let data = payload(500);

        let asymmetric = rsa();
        let sealed = asymmetric.encrypt_big(&data).unwrap();
        assert_eq!(sealed.len() % asymmetric.padded_block_size(), 0);
        assert_eq!(asymmetric.decrypt_big(&sealed).unwrap(), data);

        let symmetric = SymmetricProfile::generate();
        let sealed = symmetric.encrypt_big(&data).unwrap();
        // Whole buffer: one PKCS#7 pad, not one per 15-byte chunk.
        assert_eq!(sealed.len(), 512);
        assert_eq!(symmetric.decrypt_big(&sealed).unwrap(), data);
    }

    #[test]
    fn test_many_small_writes() {
        let profile = rsa();
        let data = payload(400);
        let mut writer = ChunkedEncryptor::new(profile, Vec::new());
        for byte in &data {
            writer.write_all(std::slice::from_ref(byte)).unwrap();
        }
        let sealed = writer.finish().unwrap();

        let mut reader = ChunkedDecryptor::new(profile, sealed.as_slice());
        let mut out = Vec::new();
        let mut small = [0u8; 7];
        loop {
            let n = reader.read(&mut small).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&small[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let profile = rsa();
        let sealed = encrypt_chunked(profile, &payload(200)).unwrap();
        let err = decrypt_chunked(profile, &sealed[..sealed.len() - 1]).unwrap_err();
        assert!(err.is_protocol_error());

        let mut reader = ChunkedDecryptor::new(profile, &sealed[..sealed.len() - 5]);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_corrupt_block_does_not_roundtrip() {
        let profile = SymmetricProfile::generate();
        let data = payload(40);
        let mut sealed = encrypt_chunked(&profile, &data).unwrap();
        sealed[0] ^= 0xff;
        assert_ne!(decrypt_chunked(&profile, &sealed).ok(), Some(data));
    }

    #[test]
    fn test_stream_errors_map_to_core() {
        let sink_failed = from_io_error(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(
            sink_failed,
            CoreError::Common(CommonError::Io { .. })
        ));

        let cipher_failed = from_io_error(to_io_error(CoreError::Decryption));
        assert!(matches!(cipher_failed, CoreError::Decryption));
    }
}
