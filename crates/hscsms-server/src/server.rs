// ============================================
// File: crates/hscsms-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Main server implementation: owns the listening socket, the top-level
//! RSA key pair and the table of connected clients, and manages the
//! server lifecycle.
//!
//! ## Main Functionality
//! - `Server::bind`: key generation and socket binding
//! - `Server::run`: accept loop
//! - `Server::shutdown`: disconnect everyone with `CLOSE`, stop accepting
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐   accept   ┌───────────────────────────┐  │
//! │  │ TcpAcceptor  │──────────► │ Connection + ServerClient │  │
//! │  └──────────────┘            │  - disconnect handler     │  │
//! │                              │  - handshake              │  │
//! │                              │  - on_disconnect: remove  │  │
//! │                              └─────────────┬─────────────┘  │
//! │                                            ▼                │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │   clients: DashMap<ConnectionId, Arc<ServerClient>>  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  server_key: Arc<AsymmetricProfile>   (read-only, shared)   │
//! │  users:      Arc<dyn UserStore>       (shared)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The RSA key lives only as long as the `Server`; a restart
//!   invalidates it and clients must fetch the new one
//! - Clients over `limits.max_clients` are kicked right after accept
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use hscsms_common::ConnectionId;
use hscsms_core::crypto::AsymmetricProfile;
use hscsms_core::protocol::{protocol_registry, ClientboundDisconnect, DisconnectReason};
use hscsms_core::{Packet, PacketRegistry};
use hscsms_transport::{Connection, TcpAcceptor};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::services::client::install_disconnect_handler;
use crate::services::{handshake, login, InMemoryUserStore, ServerClient, UserStore};

type ClientTable = DashMap<ConnectionId, Arc<ServerClient>>;

// ============================================
// Accept Backoff
// ============================================

/// First pause after a failed `accept` (e.g. EMFILE).
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between failed `accept` calls.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(ACCEPT_BACKOFF_MAX)
}

// ============================================
// Server
// ============================================

/// Main hscsms server.
///
/// # Lifecycle
/// 1. Create with `Server::bind(config).await`
/// 2. Start with `server.run().await`
/// 3. Stop with `server.shutdown()`
pub struct Server {
    /// Server configuration.
    config: ServerConfig,
    /// Top-level key pair, announced to every client.
    server_key: Arc<AsymmetricProfile>,
    /// Packet set shared by all connections.
    registry: Arc<PacketRegistry>,
    /// Listening socket.
    acceptor: TcpAcceptor,
    /// Connected clients.
    clients: Arc<ClientTable>,
    /// Account backend.
    users: Arc<dyn UserStore>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Generates the key pair and binds the listener, with an in-memory
    /// user store.
    ///
    /// # Errors
    /// Returns error if key generation or binding fails.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with_store(config, Arc::new(InMemoryUserStore::new())).await
    }

    /// Same as [`Server::bind`] with a caller-provided user store.
    ///
    /// # Errors
    /// Returns error if the config is invalid, or key generation or
    /// binding fails.
    pub async fn bind_with_store(config: ServerConfig, users: Arc<dyn UserStore>) -> Result<Self> {
        config.validate()?;

        let bits = config.security.rsa_key_bits;
        info!("Generating RSA-{} key pair", bits);
        let server_key = tokio::task::spawn_blocking(move || AsymmetricProfile::generate(bits))
            .await
            .map_err(|e| ServerError::startup_failed(format!("key generation task: {e}")))??;
        info!(fingerprint = %server_key.fingerprint(), "Server key ready");

        let registry = Arc::new(protocol_registry()?);
        let acceptor = TcpAcceptor::bind_addr(config.listen_addr())?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            server_key: Arc::new(server_key),
            registry,
            acceptor,
            clients: Arc::new(DashMap::new()),
            users,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    /// Returns the top-level key pair.
    #[must_use]
    pub fn server_key(&self) -> &AsymmetricProfile {
        &self.server_key
    }

    /// Returns the packet registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.registry
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Looks up a connected client.
    #[must_use]
    pub fn client(&self, id: ConnectionId) -> Option<Arc<ServerClient>> {
        self.clients.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of all connected clients.
    #[must_use]
    pub fn clients(&self) -> Vec<Arc<ServerClient>> {
        self.clients.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Accepts clients until shutdown.
    ///
    /// # Errors
    /// Returns `ShuttingDown` if called after `shutdown()`.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.is_shutting_down() {
            return Err(ServerError::ShuttingDown);
        }

        info!(
            "hscsms server v{} listening on {}",
            env!("CARGO_PKG_VERSION"),
            self.local_addr()
        );

        let mut backoff = ACCEPT_BACKOFF_MIN;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }
                result = self.acceptor.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            backoff = ACCEPT_BACKOFF_MIN;
                            if self.is_shutting_down() {
                                break;
                            }
                            if let Err(e) = self.accept_client(stream) {
                                warn!(peer = %peer, "Failed to set up client: {}", e);
                            }
                        }
                        Err(e) => {
                            if self.is_shutting_down() {
                                break;
                            }
                            error!(retry_in = ?backoff, "Accept error: {}", e);
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                () = tokio::time::sleep(backoff) => {}
                            }
                            backoff = next_backoff(backoff);
                        }
                    }
                }
            }
        }

        self.disconnect_all(DisconnectReason::Close);
        info!("Server stopped");
        Ok(())
    }

    fn accept_client(&self, stream: TcpStream) -> Result<()> {
        let conn = Connection::new(
            stream,
            Arc::clone(&self.registry),
            self.config.connection_config(),
        )?;

        if self.clients.len() >= self.config.limits.max_clients {
            warn!(
                peer = %conn.peer_addr(),
                limit = self.config.limits.max_clients,
                "Client limit reached, kicking"
            );
            conn.send(&Packet::new(ClientboundDisconnect {
                reason: DisconnectReason::Kick,
            }))?;
            conn.start()?;
            conn.close();
            return Ok(());
        }

        let client = ServerClient::new(conn.clone(), Arc::clone(&self.server_key));
        install_disconnect_handler(&client);

        let clients = Arc::clone(&self.clients);
        conn.on_disconnect(move |conn, cause| {
            let last_reason = clients
                .remove(&conn.id())
                .and_then(|(_, client)| client.last_reason());
            match cause {
                None => info!(
                    conn = %conn.id(),
                    peer = %conn.peer_addr(),
                    reason = ?last_reason,
                    "Client disconnected"
                ),
                Some(e) => error!(
                    conn = %conn.id(),
                    peer = %conn.peer_addr(),
                    "Client disconnected with error: {}",
                    e
                ),
            }
        });

        self.clients.insert(conn.id(), Arc::clone(&client));

        let users = Arc::clone(&self.users);
        let setup = handshake::install(&client, move |client| {
            login::install(client, Arc::clone(&users));
        })
        .and_then(|()| conn.start().map_err(ServerError::from));

        if let Err(e) = setup {
            conn.stop();
            self.clients.remove(&conn.id());
            return Err(e);
        }

        info!(conn = %conn.id(), peer = %conn.peer_addr(), "Client connected");
        Ok(())
    }

    fn disconnect_all(&self, reason: DisconnectReason) {
        for client in self.clients() {
            client.disconnect(reason);
        }
    }

    /// Disconnects every client with `CLOSE` and stops the accept loop.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down server...");
        let _ = self.shutdown_tx.send(());
        self.disconnect_all(DisconnectReason::Close);
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.local_addr())
            .field("clients", &self.clients.len())
            .field("server_key", &self.server_key.fingerprint())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig::from_str("[network]\nlisten_addr = \"127.0.0.1:0\"\n").unwrap()
    }

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let server = Server::bind(test_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.server_key().has_private_key());
        assert_eq!(server.registry().len(), 8);
        assert_eq!(server.client_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let server = Arc::new(Server::bind(test_config()).await.unwrap());
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(matches!(server.run().await, Err(ServerError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.security.rsa_key_bits = 100;
        let err = Server::bind(config).await.unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_accept_backoff_grows_to_cap() {
        let mut delay = ACCEPT_BACKOFF_MIN;
        let mut steps = 0;
        while delay < ACCEPT_BACKOFF_MAX {
            let next = next_backoff(delay);
            assert!(next > delay);
            delay = next;
            steps += 1;
        }
        assert_eq!(delay, ACCEPT_BACKOFF_MAX);
        assert!(steps < 10);
        assert_eq!(next_backoff(ACCEPT_BACKOFF_MAX), ACCEPT_BACKOFF_MAX);
    }
}
