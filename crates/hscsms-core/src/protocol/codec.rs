// ============================================
// File: crates/hscsms-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Provides the frame header format and the field-level encoders every
//! packet body is built from.
//!
//! ## Main Functionality
//! - `FrameHeader`: flag, type hash and body length of one frame
//! - `put_utf` / `get_utf` and friends: packet field encoding
//!
//! ## Wire Format
//! All multi-byte integers are big-endian.
//! ```text
//! ┌────────┬────────────────┬────────────────┬─────────────────────┐
//! │ flag   │ type_hash      │ body_length    │ body                │
//! │ u8     │ u32            │ u32            │ body_length bytes   │
//! └────────┴────────────────┴────────────────┴─────────────────────┘
//!   0 = plaintext body, 1 = body is encrypt_big(serialized packet)
//! ```
//! Every frame carries its length, so a frame whose type is unknown can
//! be skipped without losing sync with the stream.
//!
//! ## Field Encoding
//! - `utf`: u16 byte length, then UTF-8 bytes
//! - `i32`: 4 bytes
//! - `bool`: 1 byte, 0 or 1
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always check `remaining()` before `get_*`; `bytes` panics on underflow
//! - A `utf` field longer than 65535 bytes cannot be encoded
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Flag value for a plaintext frame.
pub const FLAG_PLAINTEXT: u8 = 0;

/// Flag value for an encrypted frame.
pub const FLAG_ENCRYPTED: u8 = 1;

/// Default upper bound for one frame body.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Longest encodable `utf` field in bytes.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

// ============================================
// FrameHeader
// ============================================

/// Fixed-size prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Whether the body is encrypted.
    pub encrypted: bool,
    /// Identifier hash of the packet type.
    pub type_hash: u32,
    /// Length of the body that follows.
    pub body_len: u32,
}

impl FrameHeader {
    /// Encodes the header into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(FRAME_HEADER_SIZE);
        buf.put_u8(if self.encrypted {
            FLAG_ENCRYPTED
        } else {
            FLAG_PLAINTEXT
        });
        buf.put_u32(self.type_hash);
        buf.put_u32(self.body_len);
    }

    /// Decodes a header from exactly [`FRAME_HEADER_SIZE`] bytes.
    ///
    /// # Errors
    /// - `MessageTooShort` if fewer bytes are given
    /// - `MalformedMessage` on an unknown flag
    /// - `MessageTooLarge` if the body exceeds `max_body`
    pub fn decode(buf: &[u8], max_body: usize) -> Result<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(CoreError::too_short(FRAME_HEADER_SIZE, buf.len()));
        }
        let mut buf = &buf[..FRAME_HEADER_SIZE];

        let encrypted = match buf.get_u8() {
            FLAG_PLAINTEXT => false,
            FLAG_ENCRYPTED => true,
            other => {
                return Err(CoreError::malformed(format!(
                    "unknown frame flag 0x{other:02x}"
                )))
            }
        };
        let type_hash = buf.get_u32();
        let body_len = buf.get_u32();

        if body_len as usize > max_body {
            return Err(CoreError::too_large(max_body, body_len as usize));
        }

        Ok(Self {
            encrypted,
            type_hash,
            body_len,
        })
    }
}

/// Builds a full frame: header followed by `body`.
///
/// # Errors
/// Returns `MessageTooLarge` if the body exceeds `max_body`.
pub fn encode_frame(
    encrypted: bool,
    type_hash: u32,
    body: &[u8],
    max_body: usize,
) -> Result<Bytes> {
    if body.len() > max_body {
        return Err(CoreError::too_large(max_body, body.len()));
    }
    let body_len =
        u32::try_from(body.len()).map_err(|_| CoreError::too_large(max_body, body.len()))?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    FrameHeader {
        encrypted,
        type_hash,
        body_len,
    }
    .encode(&mut buf);
    buf.put_slice(body);
    Ok(buf.freeze())
}

// ============================================
// Field Encoders
// ============================================

/// Writes a length-prefixed UTF-8 string.
///
/// # Errors
/// Returns `MessageTooLarge` if the string exceeds 65535 bytes.
pub fn put_utf(buf: &mut BytesMut, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| CoreError::too_large(MAX_UTF_LEN, value.len()))?;
    buf.reserve(2 + value.len());
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Reads a length-prefixed UTF-8 string.
///
/// # Errors
/// Returns `MessageTooShort` on truncation or `MalformedMessage` on
/// invalid UTF-8.
pub fn get_utf(buf: &mut Bytes) -> Result<String> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure_remaining(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|e| CoreError::malformed(format!("utf field: {e}")))
}

/// Reads a big-endian i32.
///
/// # Errors
/// Returns `MessageTooShort` on truncation.
pub fn get_i32(buf: &mut Bytes) -> Result<i32> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_i32())
}

/// Writes a boolean as one byte.
pub fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Reads a one-byte boolean.
///
/// # Errors
/// Returns `MessageTooShort` on truncation or `MalformedMessage` for
/// values other than 0 and 1.
pub fn get_bool(buf: &mut Bytes) -> Result<bool> {
    ensure_remaining(buf, 1)?;
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CoreError::malformed(format!("bool field: 0x{other:02x}"))),
    }
}

/// Fails with `MessageTooShort` unless `needed` bytes remain.
///
/// # Errors
/// See above.
pub fn ensure_remaining(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(CoreError::too_short(needed, buf.remaining()));
    }
    Ok(())
}

/// Fails with `MalformedMessage` if any bytes remain after a packet body.
///
/// # Errors
/// See above.
pub fn ensure_consumed(buf: &Bytes, context: &str) -> Result<()> {
    if buf.has_remaining() {
        return Err(CoreError::malformed(format!(
            "{} trailing bytes after {context}",
            buf.remaining()
        )));
    }
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_layout() {
        let frame = encode_frame(true, 0x0102_0304, b"abc", DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(&frame[..], &[1, 1, 2, 3, 4, 0, 0, 0, 3, b'a', b'b', b'c']);

        let header = FrameHeader::decode(&frame, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert!(header.encrypted);
        assert_eq!(header.type_hash, 0x0102_0304);
        assert_eq!(header.body_len, 3);
    }

    #[test]
    fn test_bad_flag_and_oversize_rejected() {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw[0] = 7;
        assert!(FrameHeader::decode(&raw, 1024).unwrap_err().is_protocol_error());

        let frame = encode_frame(false, 1, &[0u8; 64], 1024).unwrap();
        assert!(matches!(
            FrameHeader::decode(&frame, 32),
            Err(CoreError::MessageTooLarge { max: 32, actual: 64 })
        ));
        assert!(encode_frame(false, 1, &[0u8; 64], 32).is_err());
    }

    #[test]
    fn test_utf_boundaries() {
        for value in ["", "hscsms", "grüße ✓", &"x".repeat(MAX_UTF_LEN)] {
            let mut buf = BytesMut::new();
            put_utf(&mut buf, value).unwrap();
            let mut bytes = buf.freeze();
            assert_eq!(get_utf(&mut bytes).unwrap(), value);
            assert!(!bytes.has_remaining());
        }

        let mut buf = BytesMut::new();
        assert!(put_utf(&mut buf, &"x".repeat(MAX_UTF_LEN + 1)).is_err());
    }

    #[test]
    fn test_truncated_fields() {
        let mut bytes = Bytes::from_static(&[0, 5, b'a', b'b']);
        assert!(matches!(
            get_utf(&mut bytes),
            Err(CoreError::MessageTooShort { expected: 5, actual: 2 })
        ));

        let mut bytes = Bytes::from_static(&[0, 0, 1]);
        assert!(get_i32(&mut bytes).is_err());

        let mut bytes = Bytes::from_static(&[2]);
        assert!(get_bool(&mut bytes).is_err());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = Bytes::from_static(&[0, 2, 0xc3, 0x28]);
        assert!(get_utf(&mut bytes).unwrap_err().is_protocol_error());
    }
}
