// ============================================
// File: crates/hscsms-core/src/dispatch.rs
// ============================================
//! # Dispatch Tree
//!
//! ## Creation Reason
//! Every decoded packet is routed through a per-connection tree of
//! handler nodes. Nodes can detach themselves after firing, which is how
//! the handshake steps are made one-shot.
//!
//! ## Main Functionality
//! - `HandlerNode`: cloneable handle to one tree node
//! - `child_for_type`: O(1) child keyed by exact packet type
//! - `child_when`: child matched by an arbitrary predicate
//! - `with_handler` / `with_packet_handler`: attach callbacks
//! - `handle`: route one packet through the subtree
//!
//! ## Dispatch Order
//! ```text
//! handle(node, packet)
//!   1. packet absent?           → HALT
//!   2. node handlers, in order  → REMOVE detaches node, HALT returns
//!   3. typed child for type?    → recurse, skip step 4
//!   4. predicate children       → recurse into each match, in order
//!   5.                          → CONTINUE
//! ```
//! Handlers and children are snapshotted before step 2. Nodes added while
//! a packet is in flight see the next packet; nodes removed in flight are
//! skipped.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run inline on the connection's read task. Hand slow work
//!   off to another task.
//! - Locks are never held while a handler runs, so handlers may freely
//!   add or remove nodes anywhere in the tree.
//!
//! ## Last Modified
//! v0.1.0 - Initial dispatch tree

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::protocol::{Packet, PacketType, ProtocolPacket};

// ============================================
// Handler Results
// ============================================

/// Whether evaluation continues after a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAction {
    /// Keep evaluating handlers and children.
    Continue,
    /// Stop evaluating anything else for this packet.
    Halt,
}

/// What happens to the node whose handler produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    /// Node stays attached.
    Keep,
    /// Node detaches from its parent and sees no further packets.
    Remove,
}

/// Return value of every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerResult {
    /// Chain directive.
    pub chain: ChainAction,
    /// Node directive.
    pub node: NodeAction,
}

impl HandlerResult {
    /// Continue, keep the node.
    pub const CONTINUE: Self = Self {
        chain: ChainAction::Continue,
        node: NodeAction::Keep,
    };

    /// Halt, keep the node.
    pub const HALT: Self = Self {
        chain: ChainAction::Halt,
        node: NodeAction::Keep,
    };

    /// Same chain directive, but detach the node.
    #[must_use]
    pub const fn remove(self) -> Self {
        Self {
            chain: self.chain,
            node: NodeAction::Remove,
        }
    }

    /// Returns `true` for a HALT directive.
    #[must_use]
    pub const fn is_halt(&self) -> bool {
        matches!(self.chain, ChainAction::Halt)
    }

    /// Returns `true` for a REMOVE directive.
    #[must_use]
    pub const fn is_remove(&self) -> bool {
        matches!(self.node, NodeAction::Remove)
    }
}

// ============================================
// HandlerNode
// ============================================

/// Callback attached to a node.
pub type Handler<C> = Arc<dyn Fn(&C, &HandlerNode<C>, &Packet) -> HandlerResult + Send + Sync>;

/// Predicate selecting a `child_when` node.
pub type Predicate<C> = Arc<dyn Fn(&C, &HandlerNode<C>, &Packet) -> bool + Send + Sync>;

enum Matcher<C> {
    Root,
    Type(PacketType),
    When(Predicate<C>),
}

struct NodeInner<C> {
    matcher: Matcher<C>,
    parent: Weak<NodeInner<C>>,
    handlers: Mutex<Vec<Handler<C>>>,
    typed: Mutex<HashMap<u32, HandlerNode<C>>>,
    children: Mutex<Vec<HandlerNode<C>>>,
    removed: AtomicBool,
}

/// Handle to one node of a dispatch tree, generic over the context `C`
/// passed to every handler (the connection, in practice).
///
/// Clones refer to the same node.
///
/// # Example
/// ```
/// use hscsms_core::dispatch::{HandlerNode, HandlerResult};
/// use hscsms_core::protocol::{Packet, ServerboundDisconnect};
///
/// let root: HandlerNode<()> = HandlerNode::root();
/// root.child_for::<ServerboundDisconnect>()
///     .with_handler(|_, _, _| HandlerResult::HALT.remove());
///
/// let packet = Packet::new(ServerboundDisconnect);
/// assert!(root.handle(&(), Some(&packet)).is_halt());
/// assert!(!root.handle(&(), Some(&packet)).is_halt());
/// ```
pub struct HandlerNode<C> {
    inner: Arc<NodeInner<C>>,
}

impl<C> Clone for HandlerNode<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> HandlerNode<C> {
    /// Creates a new tree root.
    #[must_use]
    pub fn root() -> Self {
        Self::with_matcher(Matcher::Root, Weak::new())
    }

    fn with_matcher(matcher: Matcher<C>, parent: Weak<NodeInner<C>>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                matcher,
                parent,
                handlers: Mutex::new(Vec::new()),
                typed: Mutex::new(HashMap::new()),
                children: Mutex::new(Vec::new()),
                removed: AtomicBool::new(false),
            }),
        }
    }

    // ========================================
    // Building
    // ========================================

    /// Returns the fast-path child for `ty`, creating it if needed.
    #[must_use]
    pub fn child_for_type(&self, ty: PacketType) -> Self {
        let mut typed = self.inner.typed.lock();
        if let Some(existing) = typed.get(&ty.hash()) {
            if !existing.is_removed() {
                return existing.clone();
            }
        }
        let child = Self::with_matcher(Matcher::Type(ty), Arc::downgrade(&self.inner));
        typed.insert(ty.hash(), child.clone());
        child
    }

    /// Shorthand for `child_for_type(P::packet_type())`.
    #[must_use]
    pub fn child_for<P: ProtocolPacket>(&self) -> Self {
        self.child_for_type(P::packet_type())
    }

    /// Appends a child selected by `predicate`.
    #[must_use]
    pub fn child_when<F>(&self, predicate: F) -> Self
    where
        F: Fn(&C, &HandlerNode<C>, &Packet) -> bool + Send + Sync + 'static,
    {
        let child = Self::with_matcher(
            Matcher::When(Arc::new(predicate)),
            Arc::downgrade(&self.inner),
        );
        self.inner.children.lock().push(child.clone());
        child
    }

    /// Appends a handler; returns the node for chaining.
    pub fn with_handler<F>(&self, handler: F) -> Self
    where
        F: Fn(&C, &HandlerNode<C>, &Packet) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.handlers.lock().push(Arc::new(handler));
        self.clone()
    }

    /// Appends a handler that only sees packets of kind `P`; other kinds
    /// yield CONTINUE.
    pub fn with_packet_handler<P, F>(&self, handler: F) -> Self
    where
        P: ProtocolPacket,
        F: Fn(&C, &HandlerNode<C>, &P) -> HandlerResult + Send + Sync + 'static,
    {
        self.with_handler(move |ctx, node, packet| match packet.downcast_ref::<P>() {
            Some(typed) => handler(ctx, node, typed),
            None => HandlerResult::CONTINUE,
        })
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Detaches this node from its parent. It sees no further packets.
    pub fn remove(&self) {
        if self.inner.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(parent) = self.inner.parent.upgrade() else {
            return;
        };
        match &self.inner.matcher {
            Matcher::Type(ty) => {
                let mut typed = parent.typed.lock();
                if typed
                    .get(&ty.hash())
                    .is_some_and(|node| Arc::ptr_eq(&node.inner, &self.inner))
                {
                    typed.remove(&ty.hash());
                }
            }
            Matcher::When(_) => {
                parent
                    .children
                    .lock()
                    .retain(|node| !Arc::ptr_eq(&node.inner, &self.inner));
            }
            Matcher::Root => {}
        }
        trace!(matcher = %self.describe(), "Handler node removed");
    }

    /// Drops every handler and descendant. Used on connection teardown.
    pub fn clear(&self) {
        self.inner.handlers.lock().clear();
        let typed: Vec<_> = self.inner.typed.lock().drain().map(|(_, n)| n).collect();
        let children: Vec<_> = self.inner.children.lock().drain(..).collect();
        for node in typed.into_iter().chain(children) {
            node.inner.removed.store(true, Ordering::Release);
            node.clear();
        }
    }

    /// Returns `true` once the node has been detached.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }

    /// Number of direct children, typed and predicate.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.typed.lock().len() + self.inner.children.lock().len()
    }

    /// Number of handlers attached to this node.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    fn describe(&self) -> String {
        match &self.inner.matcher {
            Matcher::Root => "root".to_string(),
            Matcher::Type(ty) => format!("type {}", ty.name()),
            Matcher::When(_) => "predicate".to_string(),
        }
    }

    // ========================================
    // Dispatch
    // ========================================

    /// Routes `packet` through this node and its subtree.
    ///
    /// The returned result always carries `NodeAction::Keep`; removal is
    /// applied during the walk.
    pub fn handle(&self, ctx: &C, packet: Option<&Packet>) -> HandlerResult {
        let Some(packet) = packet else {
            return HandlerResult::HALT;
        };
        match self.dispatch(ctx, packet) {
            ChainAction::Continue => HandlerResult::CONTINUE,
            ChainAction::Halt => HandlerResult::HALT,
        }
    }

    fn dispatch(&self, ctx: &C, packet: &Packet) -> ChainAction {
        let handlers = self.inner.handlers.lock().clone();
        let typed = self
            .inner
            .typed
            .lock()
            .get(&packet.packet_type().hash())
            .cloned();
        let children = self.inner.children.lock().clone();

        for handler in handlers {
            let result = handler(ctx, self, packet);
            if result.is_remove() {
                self.remove();
            }
            if result.is_halt() {
                return ChainAction::Halt;
            }
        }

        if let Some(child) = typed {
            if !child.is_removed() {
                return child.dispatch(ctx, packet);
            }
        }

        for child in children {
            if child.is_removed() {
                continue;
            }
            let matched = match &child.inner.matcher {
                Matcher::When(predicate) => predicate(ctx, &child, packet),
                Matcher::Type(ty) => *ty == packet.packet_type(),
                Matcher::Root => false,
            };
            if matched && child.dispatch(ctx, packet) == ChainAction::Halt {
                return ChainAction::Halt;
            }
        }

        ChainAction::Continue
    }
}

impl<C> fmt::Debug for HandlerNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerNode")
            .field("matcher", &self.describe())
            .field("handlers", &self.handler_count())
            .field("children", &self.child_count())
            .field("removed", &self.is_removed())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ServerboundDisconnect, UnboundHandshakeOk};

    type Log = Mutex<Vec<&'static str>>;

    fn ok(message: &str) -> Packet {
        Packet::new(UnboundHandshakeOk {
            message: message.to_string(),
        })
    }

    fn record(
        tag: &'static str,
        result: HandlerResult,
    ) -> impl Fn(&Log, &HandlerNode<Log>, &Packet) -> HandlerResult {
        move |log, _, _| {
            log.lock().push(tag);
            result
        }
    }

    #[test]
    fn test_absent_packet_halts() {
        let root: HandlerNode<Log> = HandlerNode::root();
        root.with_handler(record("root", HandlerResult::CONTINUE));
        let log = Log::default();
        assert!(root.handle(&log, None).is_halt());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_typed_child_has_precedence() {
        let root: HandlerNode<Log> = HandlerNode::root();
        root.child_for::<UnboundHandshakeOk>()
            .with_handler(record("typed", HandlerResult::CONTINUE));
        root.child_when(|_, _, p| p.is::<UnboundHandshakeOk>())
            .with_handler(record("generic", HandlerResult::CONTINUE));

        let log = Log::default();
        let result = root.handle(&log, Some(&ok("x")));
        assert_eq!(result, HandlerResult::CONTINUE);
        assert_eq!(*log.lock(), vec!["typed"]);
    }

    #[test]
    fn test_predicate_children_in_order() {
        let root: HandlerNode<Log> = HandlerNode::root();
        root.with_handler(record("root", HandlerResult::CONTINUE));
        root.child_when(|_, _, _| true)
            .with_handler(record("first", HandlerResult::CONTINUE));
        root.child_when(|_, _, _| false)
            .with_handler(record("never", HandlerResult::CONTINUE));
        root.child_when(|_, _, _| true)
            .with_handler(record("second", HandlerResult::CONTINUE));

        let log = Log::default();
        root.handle(&log, Some(&ok("x")));
        assert_eq!(*log.lock(), vec!["root", "first", "second"]);
    }

    #[test]
    fn test_one_shot_removal() {
        let root: HandlerNode<Log> = HandlerNode::root();
        let node = root
            .child_for::<UnboundHandshakeOk>()
            .with_handler(record("once", HandlerResult::CONTINUE.remove()));

        let log = Log::default();
        root.handle(&log, Some(&ok("a")));
        root.handle(&log, Some(&ok("b")));
        assert_eq!(*log.lock(), vec!["once"]);
        assert!(node.is_removed());
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn test_halt_short_circuits() {
        let root: HandlerNode<Log> = HandlerNode::root();
        let first = root.child_when(|_, _, _| true);
        first.with_handler(record("first", HandlerResult::HALT));
        first.with_handler(record("first-second-handler", HandlerResult::CONTINUE));
        first
            .child_when(|_, _, _| true)
            .with_handler(record("descendant", HandlerResult::CONTINUE));
        root.child_when(|_, _, _| true)
            .with_handler(record("sibling", HandlerResult::CONTINUE));

        let log = Log::default();
        assert!(root.handle(&log, Some(&ok("x"))).is_halt());
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn test_remove_honoured_with_halt() {
        let root: HandlerNode<Log> = HandlerNode::root();
        root.child_when(|_, _, _| true)
            .with_handler(record("gate", HandlerResult::HALT.remove()));
        root.child_when(|_, _, _| true)
            .with_handler(record("after", HandlerResult::CONTINUE));

        let log = Log::default();
        assert!(root.handle(&log, Some(&ok("1"))).is_halt());
        let second = root.handle(&log, Some(&ok("2")));
        assert!(!second.is_halt());
        assert!(!second.is_remove());
        assert_eq!(*log.lock(), vec!["gate", "after"]);
    }

    #[test]
    fn test_typed_handler_skips_other_kinds() {
        let root: HandlerNode<Log> = HandlerNode::root();
        root.with_packet_handler::<ServerboundDisconnect, _>(|log: &Log, _, _| {
            log.lock().push("disconnect");
            HandlerResult::CONTINUE
        });
        root.with_packet_handler::<UnboundHandshakeOk, _>(|log: &Log, _, packet| {
            log.lock().push(if packet.message == "x" { "ok-x" } else { "ok" });
            HandlerResult::CONTINUE
        });

        let log = Log::default();
        root.handle(&log, Some(&ok("x")));
        root.handle(&log, Some(&Packet::new(ServerboundDisconnect)));
        assert_eq!(*log.lock(), vec!["ok-x", "disconnect"]);
    }

    #[test]
    fn test_nodes_added_in_flight_see_next_packet() {
        let root: HandlerNode<Log> = HandlerNode::root();
        let installer_root = root.clone();
        root.child_when(|_, _, _| true)
            .with_handler(move |log: &Log, _, _| {
                log.lock().push("installer");
                installer_root
                    .child_for::<UnboundHandshakeOk>()
                    .with_handler(record("late", HandlerResult::CONTINUE));
                HandlerResult::CONTINUE.remove()
            });

        let log = Log::default();
        root.handle(&log, Some(&ok("1")));
        root.handle(&log, Some(&ok("2")));
        assert_eq!(*log.lock(), vec!["installer", "late"]);
        root.clear();
    }

    #[test]
    fn test_child_for_type_reuses_existing() {
        let root: HandlerNode<Log> = HandlerNode::root();
        let a = root.child_for::<UnboundHandshakeOk>();
        let b = root.child_for::<UnboundHandshakeOk>();
        a.with_handler(record("a", HandlerResult::CONTINUE));
        assert_eq!(b.handler_count(), 1);
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_clear_discards_subtree() {
        let root: HandlerNode<Log> = HandlerNode::root();
        let child = root.child_when(|_, _, _| true);
        child.with_handler(record("child", HandlerResult::CONTINUE));
        root.with_handler(record("root", HandlerResult::CONTINUE));

        root.clear();
        assert!(child.is_removed());
        assert_eq!(root.child_count(), 0);

        let log = Log::default();
        root.handle(&log, Some(&ok("x")));
        assert!(log.lock().is_empty());
    }
}
