// ============================================
// File: crates/hscsms-core/src/protocol/packet.rs
// ============================================
//! # Packets and Packet Types
//!
//! ## Creation Reason
//! The transport moves packets it knows nothing about. A `PacketType`
//! carries the identifier plus the two functions that turn a `Packet`
//! into body bytes and back, so the read loop only needs a hash lookup.
//!
//! ## Main Functionality
//! - `ProtocolPacket`: implemented by every concrete message struct
//! - `PacketType`: identifier + serialize + deserialize, `Copy`
//! - `Packet`: type-erased, immutable, cheaply cloneable message value
//!
//! ## Type Erasure
//! ```text
//! ServerboundLogin { .. } ──Packet::new──► Packet { ty, body: Arc<dyn ..> }
//!                                               │
//!            downcast_ref::<ServerboundLogin>() ◄┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial packet model

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use hscsms_common::Identifier;

use crate::error::{CoreError, Result};
use crate::protocol::codec::ensure_consumed;

// ============================================
// ProtocolPacket Trait
// ============================================

/// A concrete message kind with a fixed wire layout.
///
/// # Example
/// ```
/// use bytes::{Bytes, BytesMut};
/// use hscsms_common::Identifier;
/// use hscsms_core::protocol::{codec, Packet, ProtocolPacket};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Ping { note: String }
///
/// impl ProtocolPacket for Ping {
///     const IDENTIFIER: Identifier = Identifier::new("demo/ping");
///
///     fn encode(&self, buf: &mut BytesMut) -> hscsms_core::Result<()> {
///         codec::put_utf(buf, &self.note)
///     }
///
///     fn decode(buf: &mut Bytes) -> hscsms_core::Result<Self> {
///         Ok(Self { note: codec::get_utf(buf)? })
///     }
/// }
///
/// let packet = Packet::new(Ping { note: "hi".into() });
/// assert!(packet.is::<Ping>());
/// ```
pub trait ProtocolPacket: Any + Send + Sync + fmt::Debug + Sized {
    /// Stable wire identifier of this kind.
    const IDENTIFIER: Identifier;

    /// Writes the packet body.
    ///
    /// # Errors
    /// Fails if a field cannot be encoded (e.g. oversized string).
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;

    /// Reads the packet body.
    ///
    /// # Errors
    /// Fails on truncated or malformed input.
    fn decode(buf: &mut Bytes) -> Result<Self>;

    /// Returns the `PacketType` descriptor for this kind.
    #[must_use]
    fn packet_type() -> PacketType {
        PacketType::of::<Self>()
    }
}

// ============================================
// PacketType
// ============================================

type SerializeFn = fn(&Packet, &mut BytesMut) -> Result<()>;
type DeserializeFn = fn(&mut Bytes) -> Result<Packet>;

/// Identifier plus (serialize, deserialize) function pair.
///
/// Two `PacketType`s are equal when their identifiers are equal.
#[derive(Clone, Copy)]
pub struct PacketType {
    identifier: Identifier,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl PacketType {
    /// Builds the descriptor for `P`.
    #[must_use]
    pub fn of<P: ProtocolPacket>() -> Self {
        Self {
            identifier: P::IDENTIFIER,
            serialize: serialize_as::<P>,
            deserialize: deserialize_as::<P>,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn identifier(&self) -> Identifier {
        self.identifier
    }

    /// Returns the identifier hash sent on the wire.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.identifier.hash()
    }

    /// Returns the identifier name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.identifier.name()
    }

    /// Serializes `packet` into a fresh buffer.
    ///
    /// # Errors
    /// Returns `PacketTypeMismatch` if `packet` is of another kind, or
    /// any field encoding error.
    pub fn serialize(&self, packet: &Packet) -> Result<BytesMut> {
        let mut buf = BytesMut::new();
        (self.serialize)(packet, &mut buf)?;
        Ok(buf)
    }

    /// Deserializes a complete packet body.
    ///
    /// # Errors
    /// Fails on truncated, malformed or over-long bodies.
    pub fn deserialize(&self, mut body: Bytes) -> Result<Packet> {
        (self.deserialize)(&mut body)
    }
}

impl PartialEq for PacketType {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for PacketType {}

impl fmt::Debug for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketType({:?})", self.identifier)
    }
}

fn serialize_as<P: ProtocolPacket>(packet: &Packet, buf: &mut BytesMut) -> Result<()> {
    let typed = packet
        .downcast_ref::<P>()
        .ok_or(CoreError::PacketTypeMismatch {
            expected: P::IDENTIFIER.name(),
            actual: packet.packet_type().name(),
        })?;
    typed.encode(buf)
}

fn deserialize_as<P: ProtocolPacket>(buf: &mut Bytes) -> Result<Packet> {
    let typed = P::decode(buf)?;
    ensure_consumed(buf, P::IDENTIFIER.name())?;
    Ok(Packet::new(typed))
}

// ============================================
// Packet
// ============================================

trait PacketBody: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> PacketBody for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A received or outgoing message, tagged with its `PacketType`.
///
/// Never mutated after construction; clones share the body.
#[derive(Clone)]
pub struct Packet {
    ty: PacketType,
    body: Arc<dyn PacketBody>,
}

impl Packet {
    /// Wraps a concrete packet.
    #[must_use]
    pub fn new<P: ProtocolPacket>(packet: P) -> Self {
        Self {
            ty: P::packet_type(),
            body: Arc::new(packet),
        }
    }

    /// Returns the packet's type descriptor.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.ty
    }

    /// Returns `true` if the packet is a `P`.
    #[must_use]
    pub fn is<P: ProtocolPacket>(&self) -> bool {
        self.as_any().is::<P>()
    }

    /// Returns the concrete packet if it is a `P`.
    #[must_use]
    pub fn downcast_ref<P: ProtocolPacket>(&self) -> Option<&P> {
        self.as_any().downcast_ref::<P>()
    }

    // Deref first: `Arc<dyn PacketBody>` itself satisfies the blanket impl.
    fn as_any(&self) -> &dyn Any {
        (*self.body).as_any()
    }

    /// Serializes the packet body with its own type's serializer.
    ///
    /// # Errors
    /// Propagates field encoding errors.
    pub fn serialize(&self) -> Result<BytesMut> {
        self.ty.serialize(self)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.body, f)
    }
}

impl<P: ProtocolPacket> From<P> for Packet {
    fn from(packet: P) -> Self {
        Self::new(packet)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{get_i32, get_utf, put_utf};
    use bytes::BufMut;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        text: String,
    }

    impl ProtocolPacket for Note {
        const IDENTIFIER: Identifier = Identifier::new("test/note");

        fn encode(&self, buf: &mut BytesMut) -> Result<()> {
            put_utf(buf, &self.text)
        }

        fn decode(buf: &mut Bytes) -> Result<Self> {
            Ok(Self {
                text: get_utf(buf)?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Count(i32);

    impl ProtocolPacket for Count {
        const IDENTIFIER: Identifier = Identifier::new("test/count");

        fn encode(&self, buf: &mut BytesMut) -> Result<()> {
            buf.put_i32(self.0);
            Ok(())
        }

        fn decode(buf: &mut Bytes) -> Result<Self> {
            Ok(Self(get_i32(buf)?))
        }
    }

    #[test]
    fn test_packet_downcast() {
        let packet = Packet::new(Note { text: "hi".into() });
        assert!(packet.is::<Note>());
        assert!(!packet.is::<Count>());
        assert_eq!(packet.downcast_ref::<Note>().unwrap().text, "hi");
        assert!(packet.downcast_ref::<Count>().is_none());
        assert_eq!(packet.packet_type(), Note::packet_type());
    }

    #[test]
    fn test_serialize_through_type() {
        let packet = Packet::new(Count(-2));
        let body = packet.serialize().unwrap();
        assert_eq!(&body[..], &[0xff, 0xff, 0xff, 0xfe]);

        let decoded = Count::packet_type().deserialize(body.freeze()).unwrap();
        assert_eq!(decoded.downcast_ref::<Count>(), Some(&Count(-2)));
    }

    #[test]
    fn test_wrong_serializer_rejected() {
        let packet = Packet::new(Note { text: "x".into() });
        assert!(matches!(
            Count::packet_type().serialize(&packet),
            Err(CoreError::PacketTypeMismatch {
                expected: "test/count",
                actual: "test/note"
            })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let body = Bytes::from_static(&[0, 0, 0, 1, 9]);
        assert!(Count::packet_type().deserialize(body).is_err());
    }

    #[test]
    fn test_debug_shows_body() {
        let packet = Packet::new(Count(7));
        assert_eq!(format!("{packet:?}"), "Count(7)");
        assert!(format!("{:?}", Count::packet_type()).contains("test/count"));
    }
}
