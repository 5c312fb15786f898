// ============================================
// File: crates/hscsms-transport/src/connection.rs
// ============================================
//! # Connection Worker
//!
//! ## Creation Reason
//! Owns one TCP stream: a read task that decodes frames and feeds the
//! dispatch tree, and a writer task that drains a single send queue.
//!
//! ## Main Functionality
//! - `Connection`: cloneable handle shared by handlers and application code
//! - `send` / `send_encrypted`: encode now, write in order on the writer task
//! - `set_decryption_profile`: swap the profile used for encrypted frames
//! - `on_disconnect`: callback invoked exactly once at teardown
//! - `close` (graceful, flushes the queue) and `stop` (immediate)
//!
//! ## Task Layout
//! ```text
//!              ┌──────────────────── Connection ────────────────────┐
//!  socket ───► │ read task: read_frame → decode_frame → root.handle │
//!              │                                                     │
//!  send() ───► │ mpsc queue ──► writer task: write_all ──────────────┼──► socket
//!              │                                                     │
//!              │ shutdown broadcast ──► both tasks                   │
//!              └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Teardown
//! Any read error, a clean EOF, a write error, `close()` or `stop()`
//! ends both tasks. The dispatch tree is cleared, then the disconnect
//! callback runs once with the causing error (`None` for a clean close).
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run on the read task. While one runs, no further frames
//!   are read from this connection.
//! - Never hold `decryption` or `on_disconnect` locks across an await
//!
//! ## Last Modified
//! v0.1.0 - Initial connection worker

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use hscsms_common::error::CommonError;
use hscsms_common::ConnectionId;
use hscsms_core::crypto::CipherProfile;
use hscsms_core::protocol::DEFAULT_MAX_FRAME_SIZE;
use hscsms_core::{HandlerNode, Packet, PacketRegistry};

use crate::error::{Result, TransportError};
use crate::frame::{decode_frame, encode_packet, read_frame, FrameOutcome, RawFrame};
use crate::listener;

// ============================================
// ConnectionConfig
// ============================================

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest accepted frame body, in bytes.
    pub max_frame_size: usize,
    /// Idle limit for a single frame read; `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: None,
        }
    }
}

// ============================================
// Connection
// ============================================

/// Callback run once when a connection is torn down.
pub type DisconnectCallback = Arc<dyn Fn(&Connection, Option<&TransportError>) + Send + Sync>;

enum Outbound {
    Frame(Bytes),
    Close,
}

struct Pending {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
}

struct Inner {
    id: ConnectionId,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    config: ConnectionConfig,
    registry: Arc<PacketRegistry>,
    root: HandlerNode<Connection>,
    decryption: RwLock<Option<Arc<dyn CipherProfile>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Mutex<Option<Pending>>,
    on_disconnect: RwLock<Option<DisconnectCallback>>,
    /// Cleared exactly once, at teardown
    active: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// Handle to one TCP connection. Clones share the same connection.
///
/// # Lifecycle
/// 1. `Connection::new` / `Connection::connect`: stream owned, tasks idle
/// 2. Install handlers on `node()`, set `on_disconnect`
/// 3. `start()`: read and writer tasks spawned
/// 4. `close()` / `stop()` / peer disconnect: teardown, tree cleared, callback
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wraps an established stream. No I/O happens until `start()`.
    ///
    /// # Errors
    /// Returns `Io` if the socket addresses cannot be read.
    pub fn new(
        stream: TcpStream,
        registry: Arc<PacketRegistry>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| TransportError::io("getting peer address", e))?;
        let local_addr = stream
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                peer_addr,
                local_addr,
                config,
                registry,
                root: HandlerNode::root(),
                decryption: RwLock::new(None),
                outbound,
                pending: Mutex::new(Some(Pending {
                    reader,
                    writer,
                    outbound_rx,
                })),
                on_disconnect: RwLock::new(None),
                active: AtomicBool::new(true),
                shutdown_tx,
            }),
        })
    }

    /// Dials `addr` and wraps the stream.
    ///
    /// # Errors
    /// Returns `ConnectFailed` if the peer is unreachable.
    pub async fn connect(
        addr: SocketAddr,
        registry: Arc<PacketRegistry>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let stream = listener::connect(addr).await?;
        Self::new(stream, registry, config)
    }

    // ========================================
    // Accessors
    // ========================================

    /// Returns the connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the remote address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Returns the local address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Returns the packet registry frames are decoded against.
    #[must_use]
    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.inner.registry
    }

    /// Returns the root of this connection's dispatch tree.
    #[must_use]
    pub fn node(&self) -> HandlerNode<Connection> {
        self.inner.root.clone()
    }

    /// Returns `true` until the connection has been torn down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Returns `true` once `start()` has spawned the tasks.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.pending.lock().is_none()
    }

    // ========================================
    // Configuration
    // ========================================

    /// Sets (or clears) the profile used to decrypt encrypted frames.
    pub fn set_decryption_profile(&self, profile: Option<Arc<dyn CipherProfile>>) {
        if let Some(p) = &profile {
            debug!(conn = %self.id(), transformation = p.transformation(), "Decryption profile set");
        }
        *self.inner.decryption.write() = profile;
    }

    /// Returns the current decryption profile.
    #[must_use]
    pub fn decryption_profile(&self) -> Option<Arc<dyn CipherProfile>> {
        self.inner.decryption.read().clone()
    }

    /// Sets the callback run once at teardown, replacing any previous one.
    pub fn on_disconnect<F>(&self, callback: F)
    where
        F: Fn(&Connection, Option<&TransportError>) + Send + Sync + 'static,
    {
        *self.inner.on_disconnect.write() = Some(Arc::new(callback));
    }

    // ========================================
    // Sending
    // ========================================

    /// Queues `packet` as a plaintext frame.
    ///
    /// # Errors
    /// - `NotConnected` after teardown
    /// - Serialization errors
    pub fn send(&self, packet: &Packet) -> Result<()> {
        self.enqueue(packet, None)
    }

    /// Queues `packet` as a frame encrypted with `profile`.
    ///
    /// # Errors
    /// - `NotConnected` after teardown
    /// - Serialization or encryption errors
    pub fn send_encrypted(&self, packet: &Packet, profile: &dyn CipherProfile) -> Result<()> {
        self.enqueue(packet, Some(profile))
    }

    fn enqueue(&self, packet: &Packet, profile: Option<&dyn CipherProfile>) -> Result<()> {
        if !self.is_active() {
            return Err(TransportError::NotConnected);
        }
        let frame = encode_packet(packet, profile, self.inner.config.max_frame_size)?;
        trace!(
            conn = %self.id(),
            packet = packet.packet_type().name(),
            encrypted = profile.is_some(),
            len = frame.len(),
            "Queued frame"
        );
        self.inner
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::NotConnected)
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Spawns the read and writer tasks.
    ///
    /// # Errors
    /// Returns `InvalidState` if already started, `NotConnected` if the
    /// connection was torn down before starting.
    pub fn start(&self) -> Result<()> {
        let Some(pending) = self.inner.pending.lock().take() else {
            return Err(CommonError::invalid_state("idle", "started").into());
        };
        if !self.is_active() {
            return Err(TransportError::NotConnected);
        }

        let read_shutdown = self.inner.shutdown_tx.subscribe();
        let write_shutdown = self.inner.shutdown_tx.subscribe();

        tokio::spawn(Self::read_loop(
            self.clone(),
            pending.reader,
            read_shutdown,
        ));
        tokio::spawn(Self::write_loop(
            self.clone(),
            pending.writer,
            pending.outbound_rx,
            write_shutdown,
        ));

        debug!(conn = %self.id(), peer = %self.peer_addr(), "Connection started");
        Ok(())
    }

    /// Flushes queued frames, then closes the stream.
    pub fn close(&self) {
        if !self.is_started() {
            self.teardown(None);
            return;
        }
        // Fails only when the writer already exited
        if self.inner.outbound.send(Outbound::Close).is_err() {
            self.teardown(None);
        }
    }

    /// Closes the stream immediately, dropping queued frames.
    pub fn stop(&self) {
        self.teardown(None);
    }

    fn teardown(&self, cause: Option<TransportError>) {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.shutdown_tx.send(());
        // Drop unstarted halves so the socket closes
        self.inner.pending.lock().take();

        match &cause {
            None => info!(conn = %self.id(), peer = %self.peer_addr(), "Connection closed"),
            Some(e) if e.is_connection_lost() => {
                info!(conn = %self.id(), peer = %self.peer_addr(), "Connection lost: {}", e);
            }
            Some(e) => error!(conn = %self.id(), peer = %self.peer_addr(), "Connection failed: {}", e),
        }

        self.inner.root.clear();
        *self.inner.decryption.write() = None;

        let callback = self.inner.on_disconnect.write().take();
        if let Some(callback) = callback {
            callback(self, cause.as_ref());
        }
    }

    // ========================================
    // Tasks
    // ========================================

    async fn read_loop(
        conn: Connection,
        reader: OwnedReadHalf,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut reader = BufReader::new(reader);
        let max = conn.inner.config.max_frame_size;
        let timeout = conn.inner.config.read_timeout;

        let cause = loop {
            let next = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, read_frame(&mut reader, max))
                        .await
                        .unwrap_or_else(|_| {
                            Err(TransportError::Timeout {
                                operation: format!("frame read ({}s)", limit.as_secs()),
                            })
                        }),
                    None => read_frame(&mut reader, max).await,
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break None,
                result = next => match result {
                    Ok(Some(frame)) => conn.process_frame(frame),
                    Ok(None) => break None,
                    Err(e) => break Some(e),
                },
            }

            if !conn.is_active() {
                break None;
            }
        };

        conn.teardown(cause);
    }

    async fn write_loop(
        conn: Connection,
        mut writer: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                message = outbound_rx.recv() => match message {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = writer.write_all(&frame).await {
                            conn.teardown(Some(TransportError::io("writing frame", e)));
                            return;
                        }
                    }
                    Some(Outbound::Close) | None => break,
                },
            }
        }

        let _ = writer.shutdown().await;
        conn.teardown(None);
    }

    fn process_frame(&self, frame: RawFrame) {
        trace!(
            conn = %self.id(),
            hash = %format_args!("{:08x}", frame.header.type_hash),
            encrypted = frame.header.encrypted,
            len = frame.body.len(),
            "Received frame"
        );

        let decryption = self.decryption_profile();
        match decode_frame(&self.inner.registry, frame, decryption.as_deref()) {
            FrameOutcome::Packet(packet) => {
                let result = self.inner.root.handle(self, Some(&packet));
                trace!(conn = %self.id(), packet = packet.packet_type().name(), halted = result.is_halt(), "Dispatched");
            }
            FrameOutcome::UnknownType(hash) => {
                debug!(conn = %self.id(), hash = %format_args!("{hash:08x}"), "Dropped frame of unknown type");
            }
            FrameOutcome::NoDecryptionProfile(ty) => {
                warn!(conn = %self.id(), packet = ty.name(), "Dropped encrypted frame: no decryption profile");
            }
            FrameOutcome::DecryptFailed(ty, e) => {
                warn!(conn = %self.id(), packet = ty.name(), "Dropped frame: {}", e);
            }
            FrameOutcome::DecodeFailed(ty, e) => {
                warn!(conn = %self.id(), packet = ty.name(), "Dropped undecodable frame: {}", e);
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("peer_addr", &self.peer_addr())
            .field("active", &self.is_active())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
