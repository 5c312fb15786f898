// ============================================
// File: crates/hscsms-transport/src/frame.rs
// ============================================
//! # Frame I/O
//!
//! ## Creation Reason
//! Bridges the synchronous frame codec in `hscsms-core` to async byte
//! streams, and turns frames into packets (and back) using the registry
//! and the active cipher profiles.
//!
//! ## Main Functionality
//! - `read_frame`: read one length-prefixed frame from an `AsyncRead`
//! - `encode_packet`: serialize, optionally encrypt, and frame a packet
//! - `decode_frame`: resolve, optionally decrypt, and deserialize a frame
//!
//! ## Decode Outcomes
//! ```text
//! RawFrame ──► hash known? ──no──► UnknownType          (drop, debug)
//!                 │yes
//!                 ▼
//!            encrypted? ──yes──► profile set? ──no──► NoDecryptionProfile (drop, warn)
//!                 │                   │yes
//!                 │                   ▼
//!                 │              decrypt_big ──err──► DecryptFailed       (drop, warn)
//!                 ▼                   │
//!            deserialize ◄────────────┘
//!                 │──err──► DecodeFailed                                  (drop, warn)
//!                 ▼
//!              Packet
//! ```
//! None of the outcomes desynchronize the stream: the body is always
//! fully consumed before it is interpreted.
//!
//! ## Last Modified
//! v0.1.0 - Initial frame I/O

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use hscsms_core::crypto::CipherProfile;
use hscsms_core::protocol::codec::{encode_frame, FrameHeader, FRAME_HEADER_SIZE};
use hscsms_core::{CoreError, Packet, PacketRegistry, PacketType};

use crate::error::{Result, TransportError};

// ============================================
// RawFrame
// ============================================

/// One frame as read from the wire, body not yet interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Body bytes (ciphertext if `header.encrypted`).
    pub body: Bytes,
}

/// Reads one frame.
///
/// # Returns
/// - `Ok(Some(frame))` - A complete frame
/// - `Ok(None)` - Clean end of stream at a frame boundary
///
/// # Errors
/// - `MalformedFrame` on a bad flag or an oversized body
/// - `Io` (`UnexpectedEof`) if the stream ends inside a frame
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<RawFrame>>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader
            .read(&mut head[filled..])
            .await
            .map_err(|e| TransportError::io("reading frame header", e))?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::io(
                "reading frame header",
                std::io::ErrorKind::UnexpectedEof.into(),
            ));
        }
        filled += n;
    }

    let header = FrameHeader::decode(&head, max_frame_size)
        .map_err(|e| TransportError::malformed_frame(e.to_string()))?;

    let mut body = BytesMut::zeroed(header.body_len as usize);
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| TransportError::io("reading frame body", e))?;

    Ok(Some(RawFrame {
        header,
        body: body.freeze(),
    }))
}

/// Serializes `packet` into a complete frame, encrypting the body with
/// `profile` when one is given.
///
/// # Errors
/// Propagates serialization and encryption errors, and rejects bodies
/// larger than `max_frame_size`.
pub fn encode_packet(
    packet: &Packet,
    profile: Option<&dyn CipherProfile>,
    max_frame_size: usize,
) -> Result<Bytes> {
    let body = packet.serialize()?;
    let hash = packet.packet_type().hash();
    let frame = match profile {
        Some(profile) => {
            let sealed = profile.encrypt_big(&body)?;
            encode_frame(true, hash, &sealed, max_frame_size)?
        }
        None => encode_frame(false, hash, &body, max_frame_size)?,
    };
    Ok(frame)
}

// ============================================
// FrameOutcome
// ============================================

/// Result of interpreting one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// A fully decoded packet.
    Packet(Packet),
    /// The type hash is not registered.
    UnknownType(u32),
    /// Encrypted frame but no decryption profile is set.
    NoDecryptionProfile(PacketType),
    /// The body did not decrypt.
    DecryptFailed(PacketType, CoreError),
    /// The body did not deserialize.
    DecodeFailed(PacketType, CoreError),
}

/// Interprets a frame against `registry` and the current decryption
/// profile.
#[must_use]
pub fn decode_frame(
    registry: &PacketRegistry,
    frame: RawFrame,
    decryption: Option<&dyn CipherProfile>,
) -> FrameOutcome {
    let Some(ty) = registry.resolve_hash(frame.header.type_hash) else {
        return FrameOutcome::UnknownType(frame.header.type_hash);
    };

    let body = if frame.header.encrypted {
        let Some(profile) = decryption else {
            return FrameOutcome::NoDecryptionProfile(ty);
        };
        match profile.decrypt_big(&frame.body) {
            Ok(plain) => Bytes::from(plain),
            Err(e) => return FrameOutcome::DecryptFailed(ty, e),
        }
    } else {
        frame.body
    };

    match ty.deserialize(body) {
        Ok(packet) => FrameOutcome::Packet(packet),
        Err(e) => FrameOutcome::DecodeFailed(ty, e),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use hscsms_core::crypto::SymmetricProfile;
    use hscsms_core::ProtocolPacket;
    use hscsms_core::protocol::{protocol_registry, UnboundHandshakeOk, DEFAULT_MAX_FRAME_SIZE};

    fn ok(message: &str) -> Packet {
        Packet::new(UnboundHandshakeOk {
            message: message.to_string(),
        })
    }

    async fn read_all(bytes: &[u8]) -> Vec<RawFrame> {
        let mut reader = bytes;
        let mut frames = Vec::new();
        while let Some(frame) = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_plain_frame_roundtrip() {
        let registry = protocol_registry().unwrap();
        let wire = encode_packet(&ok("abc123"), None, DEFAULT_MAX_FRAME_SIZE).unwrap();
        let frames = read_all(&wire).await;
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].header.encrypted);

        match decode_frame(&registry, frames[0].clone(), None) {
            FrameOutcome::Packet(p) => {
                assert_eq!(p.downcast_ref::<UnboundHandshakeOk>().unwrap().message, "abc123");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_encrypted_frame_needs_profile() {
        let registry = protocol_registry().unwrap();
        let profile = SymmetricProfile::generate();
        let wire = encode_packet(&ok("secret"), Some(&profile), DEFAULT_MAX_FRAME_SIZE).unwrap();
        let frame = read_all(&wire).await.remove(0);
        assert!(frame.header.encrypted);

        assert!(matches!(
            decode_frame(&registry, frame.clone(), None),
            FrameOutcome::NoDecryptionProfile(_)
        ));
        assert!(matches!(
            decode_frame(&registry, frame.clone(), Some(&SymmetricProfile::generate())),
            FrameOutcome::DecryptFailed(..) | FrameOutcome::DecodeFailed(..)
        ));
        assert!(matches!(
            decode_frame(&registry, frame, Some(&profile)),
            FrameOutcome::Packet(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_keeps_stream_in_sync() {
        let registry = protocol_registry().unwrap();
        let mut wire = encode_frame(false, 0xdead_beef, b"opaque body", DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .to_vec();
        wire.extend_from_slice(&encode_packet(&ok("next"), None, DEFAULT_MAX_FRAME_SIZE).unwrap());

        let mut frames = read_all(&wire).await.into_iter();
        assert!(matches!(
            decode_frame(&registry, frames.next().unwrap(), None),
            FrameOutcome::UnknownType(0xdead_beef)
        ));
        assert!(matches!(
            decode_frame(&registry, frames.next().unwrap(), None),
            FrameOutcome::Packet(_)
        ));
    }

    #[tokio::test]
    async fn test_truncated_and_oversized_frames() {
        let wire = encode_packet(&ok("abc"), None, DEFAULT_MAX_FRAME_SIZE).unwrap();

        let mut partial_header = &wire[..4];
        let err = read_frame(&mut partial_header, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();
        assert!(err.is_connection_lost());

        let mut partial_body = &wire[..wire.len() - 1];
        assert!(read_frame(&mut partial_body, DEFAULT_MAX_FRAME_SIZE).await.is_err());

        let mut whole = &wire[..];
        let err = read_frame(&mut whole, 2).await.unwrap_err();
        assert!(err.is_framing_error());
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        use tokio::io::AsyncWriteExt;

        let wire = encode_packet(&ok("dribbled"), None, DEFAULT_MAX_FRAME_SIZE).unwrap();
        let (mut tx, mut rx) = tokio::io::duplex(4);
        let writer = tokio::spawn(async move {
            for piece in wire.chunks(3) {
                tx.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let frame = read_frame(&mut rx, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap()
            .unwrap();
        writer.await.unwrap();
        assert_eq!(frame.header.type_hash, UnboundHandshakeOk::IDENTIFIER.hash());
        assert!(read_frame(&mut rx, DEFAULT_MAX_FRAME_SIZE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_reported() {
        let registry = protocol_registry().unwrap();
        let hash = UnboundHandshakeOk::packet_type().hash();
        let wire = encode_frame(false, hash, &[0, 9, b'x'], DEFAULT_MAX_FRAME_SIZE).unwrap();
        let frame = read_all(&wire).await.remove(0);
        assert!(matches!(
            decode_frame(&registry, frame, None),
            FrameOutcome::DecodeFailed(..)
        ));
    }
}
