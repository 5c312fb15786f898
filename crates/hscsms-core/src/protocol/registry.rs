// ============================================
// File: crates/hscsms-core/src/protocol/registry.rs
// ============================================
//! # Packet Type Registry
//!
//! ## Creation Reason
//! Both ends must agree on which serializer a type hash selects. The
//! registry maps hashes (wire side) and names (sender side) to
//! `PacketType` descriptors.
//!
//! ## Main Functionality
//! - `register`: add a descriptor, refusing duplicates and hash collisions
//! - `resolve_hash`: O(1) lookup by wire hash
//! - `resolve`: O(1) lookup by identifier name
//!
//! ## ⚠️ Important Note for Next Developer
//! - Fill the registry once at startup, then share it behind an `Arc`.
//!   There is no removal and no interior mutability.
//!
//! ## Last Modified
//! v0.1.0 - Initial registry

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CoreError, Result};
use crate::protocol::packet::{PacketType, ProtocolPacket};

/// Hash/name → `PacketType` lookup table.
#[derive(Debug, Default, Clone)]
pub struct PacketRegistry {
    by_hash: HashMap<u32, PacketType>,
    by_name: HashMap<&'static str, u32>,
}

impl PacketRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a packet type under its identifier hash.
    ///
    /// # Errors
    /// - `DuplicatePacketType` if the name is already registered
    /// - `HashCollision` if a different name already owns the hash
    pub fn register(&mut self, ty: PacketType) -> Result<()> {
        let id = ty.identifier();
        if let Some(existing) = self.by_hash.get(&id.hash()) {
            if existing.name() == id.name() {
                return Err(CoreError::DuplicatePacketType {
                    identifier: id.name(),
                });
            }
            return Err(CoreError::HashCollision {
                hash: id.hash(),
                existing: existing.name(),
                incoming: id.name(),
            });
        }

        trace!(identifier = id.name(), hash = %format_args!("{:08x}", id.hash()), "Registered packet type");
        self.by_hash.insert(id.hash(), ty);
        self.by_name.insert(id.name(), id.hash());
        Ok(())
    }

    /// Registers the descriptor of `P`.
    ///
    /// # Errors
    /// See [`PacketRegistry::register`].
    pub fn register_packet<P: ProtocolPacket>(&mut self) -> Result<()> {
        self.register(P::packet_type())
    }

    /// Looks up a type by its wire hash.
    #[must_use]
    pub fn resolve_hash(&self, hash: u32) -> Option<PacketType> {
        self.by_hash.get(&hash).copied()
    }

    /// Looks up a type by its identifier name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PacketType> {
        self.by_name
            .get(name)
            .and_then(|hash| self.resolve_hash(*hash))
    }

    /// Returns `true` if `P` is registered.
    #[must_use]
    pub fn contains<P: ProtocolPacket>(&self) -> bool {
        self.resolve_hash(P::IDENTIFIER.hash())
            .is_some_and(|ty| ty.name() == P::IDENTIFIER.name())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use hscsms_common::Identifier;

    #[derive(Debug)]
    struct Alpha;

    impl ProtocolPacket for Alpha {
        const IDENTIFIER: Identifier = Identifier::new("test/alpha");

        fn encode(&self, _buf: &mut BytesMut) -> Result<()> {
            Ok(())
        }

        fn decode(_buf: &mut Bytes) -> Result<Self> {
            Ok(Self)
        }
    }

    // FNV-1a collides on these two names.
    #[derive(Debug)]
    struct CollideA;
    #[derive(Debug)]
    struct CollideB;

    impl ProtocolPacket for CollideA {
        const IDENTIFIER: Identifier = Identifier::new("costarring");

        fn encode(&self, _buf: &mut BytesMut) -> Result<()> {
            Ok(())
        }

        fn decode(_buf: &mut Bytes) -> Result<Self> {
            Ok(Self)
        }
    }

    impl ProtocolPacket for CollideB {
        const IDENTIFIER: Identifier = Identifier::new("liquid");

        fn encode(&self, _buf: &mut BytesMut) -> Result<()> {
            Ok(())
        }

        fn decode(_buf: &mut Bytes) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = PacketRegistry::new();
        assert!(registry.is_empty());
        registry.register_packet::<Alpha>().unwrap();

        let by_hash = registry.resolve_hash(Alpha::IDENTIFIER.hash()).unwrap();
        assert_eq!(by_hash.name(), "test/alpha");
        assert_eq!(registry.resolve("test/alpha"), Some(by_hash));
        assert!(registry.resolve("test/beta").is_none());
        assert!(registry.resolve_hash(0xdead_beef).is_none());
        assert!(registry.contains::<Alpha>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PacketRegistry::new();
        registry.register_packet::<Alpha>().unwrap();
        assert!(matches!(
            registry.register_packet::<Alpha>(),
            Err(CoreError::DuplicatePacketType {
                identifier: "test/alpha"
            })
        ));
    }

    #[test]
    fn test_hash_collision_rejected() {
        assert_eq!(
            CollideA::IDENTIFIER.hash(),
            CollideB::IDENTIFIER.hash(),
            "fixture names must collide"
        );

        let mut registry = PacketRegistry::new();
        registry.register_packet::<CollideA>().unwrap();
        let err = registry.register_packet::<CollideB>().unwrap_err();
        assert!(err.is_registry_error());
        assert!(matches!(
            err,
            CoreError::HashCollision {
                existing: "costarring",
                incoming: "liquid",
                ..
            }
        ));
        assert!(registry.contains::<CollideA>());
        assert!(!registry.contains::<CollideB>());
    }
}
