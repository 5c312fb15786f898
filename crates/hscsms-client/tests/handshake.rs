// ============================================
// File: crates/hscsms-client/tests/handshake.rs
// ============================================
//! End-to-end tests: a real `Server` on 127.0.0.1:0 and real clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use hscsms_client::{ClientError, ClientSession};
use hscsms_core::crypto::{CipherProfile, SymmetricProfile};
use hscsms_core::protocol::codec::encode_frame;
use hscsms_core::protocol::{
    protocol_registry, ClientboundDisconnect, ClientboundPublicKey, DisconnectReason,
    ProtocolPacket, ServerboundClientKey, ServerboundDisconnect, UnboundHandshakeOk,
    DEFAULT_MAX_FRAME_SIZE, VERIFICATION_SUFFIX,
};
use hscsms_core::{HandlerResult, Packet, PacketRegistry};
use hscsms_server::{Server, ServerConfig};
use hscsms_transport::{Connection, ConnectionConfig};

const WAIT: Duration = Duration::from_secs(10);

async fn start_server(extra: &str) -> Arc<Server> {
    let toml = format!("[network]\nlisten_addr = \"127.0.0.1:0\"\n{extra}");
    let server = Arc::new(Server::bind(ServerConfig::from_str(&toml).unwrap()).await.unwrap());
    let runner = Arc::clone(&server);
    tokio::spawn(async move { runner.run().await });
    server
}

fn registry() -> Arc<PacketRegistry> {
    Arc::new(protocol_registry().unwrap())
}

async fn connect(server: &Server) -> ClientSession {
    ClientSession::connect(server.local_addr(), registry(), ConnectionConfig::default())
        .await
        .unwrap()
}

async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_handshake_happy_path() {
    let server = start_server("").await;
    let session = connect(&server).await;

    tokio::time::timeout(WAIT, session.wait_ready())
        .await
        .unwrap()
        .unwrap();
    assert!(session.is_ready());

    eventually("server side ready", || {
        server.clients().first().is_some_and(|c| c.is_ready())
    })
    .await;

    session.disconnect();
    eventually("client removed", || server.client_count() == 0).await;
    server.shutdown();
}

#[tokio::test]
async fn test_handshake_tamper_is_kicked() {
    let server = start_server("").await;
    let conn = Connection::connect(server.local_addr(), registry(), ConnectionConfig::default())
        .await
        .unwrap();
    let root = conn.node();
    let (reason_tx, mut reason_rx) = mpsc::unbounded_channel();

    root.child_for::<ClientboundPublicKey>()
        .with_packet_handler::<ClientboundPublicKey, _>(|conn, _, packet| {
            let session = Arc::new(SymmetricProfile::generate());
            let reply = Packet::new(ServerboundClientKey {
                key: session.key().clone(),
            });
            conn.send_encrypted(&reply, &packet.profile()).unwrap();
            let session_dyn: Arc<dyn CipherProfile> = session;
            conn.set_decryption_profile(Some(session_dyn));
            HandlerResult::HALT.remove()
        });

    root.child_for::<UnboundHandshakeOk>()
        .with_packet_handler::<UnboundHandshakeOk, _>(|conn, _, packet| {
            let session = conn.decryption_profile().unwrap();
            let echo = Packet::new(UnboundHandshakeOk {
                message: format!("{}-WRONG", packet.message),
            });
            conn.send_encrypted(&echo, session.as_ref()).unwrap();
            HandlerResult::HALT.remove()
        });

    root.child_for::<ClientboundDisconnect>()
        .with_packet_handler::<ClientboundDisconnect, _>(move |_, _, packet| {
            let _ = reason_tx.send(packet.reason);
            HandlerResult::HALT
        });

    conn.start().unwrap();

    // Watch the server side until the kick arrives; it must never be ready
    let deadline = tokio::time::Instant::now() + WAIT;
    let mut saw_ready = false;
    let reason = loop {
        saw_ready |= server.clients().iter().any(|c| c.is_ready());
        match reason_rx.try_recv() {
            Ok(reason) => break reason,
            Err(_) => {
                assert!(tokio::time::Instant::now() < deadline, "timed out waiting for kick");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    };
    assert_eq!(reason, DisconnectReason::Kick);
    assert!(!saw_ready);

    eventually("connection closed by server", || !conn.is_active()).await;
    eventually("client removed", || server.client_count() == 0).await;
    server.shutdown();
}

#[tokio::test]
async fn test_replayed_handshake_after_ready_is_ignored() {
    let server = start_server("").await;
    let session = connect(&server).await;
    session.wait_ready().await.unwrap();
    eventually("server side ready", || {
        server.clients().first().is_some_and(|c| c.is_ready())
    })
    .await;

    let conn = session.connection();
    let session_key = conn.decryption_profile().unwrap();
    let replayed_key = Packet::new(ServerboundClientKey {
        key: SymmetricProfile::generate().key().clone(),
    });
    let replayed_echo = Packet::new(UnboundHandshakeOk {
        message: format!("x{VERIFICATION_SUFFIX}"),
    });
    conn.send_encrypted(&replayed_key, session_key.as_ref()).unwrap();
    conn.send_encrypted(&replayed_echo, session_key.as_ref()).unwrap();

    // Answered in order after the replays, so they were already handled
    let id = session.create_user("dave", "pw").await.unwrap();
    assert_eq!(session.login("dave", "pw").await.unwrap(), id);

    let clients = server.clients();
    assert_eq!(clients.len(), 1);
    assert!(clients[0].is_ready());
    assert_eq!(clients[0].handshake().state_name(), "ready");
    assert!(session.is_connected());
    assert_eq!(session.disconnect_reason(), None);

    server.shutdown();
}

#[tokio::test]
async fn test_unknown_type_keeps_connection_open() {
    let server = start_server("").await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    let junk = encode_frame(false, 0xdead_beef, b"not a packet", DEFAULT_MAX_FRAME_SIZE).unwrap();
    stream.write_all(&junk).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.client_count(), 1);

    // A correctly framed goodbye after the junk is still understood
    let goodbye = encode_frame(
        false,
        ServerboundDisconnect::IDENTIFIER.hash(),
        &[],
        DEFAULT_MAX_FRAME_SIZE,
    )
    .unwrap();
    stream.write_all(&goodbye).await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    // Only the public key announcement was ever sent
    assert!(!received.is_empty());
    assert_eq!(
        u32::from_be_bytes(received[1..5].try_into().unwrap()),
        ClientboundPublicKey::IDENTIFIER.hash()
    );

    eventually("client removed", || server.client_count() == 0).await;
    server.shutdown();
}

#[tokio::test]
async fn test_create_user_then_login() {
    let server = start_server("").await;
    let session = connect(&server).await;
    session.wait_ready().await.unwrap();

    let id = session.create_user("alice", "s3cret").await.unwrap();
    assert_eq!(session.login("alice", "s3cret").await.unwrap(), id);

    let err = session.create_user("alice", "again").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref reason } if reason == "user_exists"));

    let err = session.login("alice", "nope").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref reason } if reason == "invalid_password"));

    let err = session.login("bob", "s3cret").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref reason } if reason == "unknown_user"));

    let err = session.create_user("has space", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref reason } if reason == "invalid_username"));

    let logged_in = server
        .clients()
        .first()
        .and_then(|client| client.user_id());
    assert_eq!(logged_in, Some(id));

    server.shutdown();
}

#[tokio::test]
async fn test_reconnect_runs_fresh_handshake() {
    let server = start_server("").await;
    let session = connect(&server).await;
    session.wait_ready().await.unwrap();
    session.create_user("carol", "pw").await.unwrap();
    let first = session.connection().id();

    session.reconnect().await.unwrap();
    session.wait_ready().await.unwrap();
    assert_ne!(session.connection().id(), first);
    assert!(session.login("carol", "pw").await.is_ok());

    server.shutdown();
}

#[tokio::test]
async fn test_requests_before_ready_fail() {
    let server = start_server("").await;
    let session = connect(&server).await;
    // Racing the handshake: either we were too early, or it already finished
    match session.login("x", "y").await {
        Err(ClientError::NotReady) | Err(ClientError::Rejected { .. }) => {}
        other => panic!("unexpected {other:?}"),
    }
    server.shutdown();
}

#[tokio::test]
async fn test_client_limit_kicks() {
    let server = start_server("[limits]\nmax_clients = 1\n").await;
    let first = connect(&server).await;
    first.wait_ready().await.unwrap();

    let second = connect(&server).await;
    let err = tokio::time::timeout(WAIT, second.wait_ready())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ClientError::HandshakeFailed { .. }));
    assert_eq!(second.disconnect_reason(), Some(DisconnectReason::Kick));
    assert!(first.is_connected());

    server.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = start_server("").await;
    let session = connect(&server).await;
    session.wait_ready().await.unwrap();
    eventually("server side ready", || {
        server.clients().first().is_some_and(|c| c.is_ready())
    })
    .await;

    server.shutdown();

    eventually("client disconnected", || !session.is_connected()).await;
    assert_eq!(session.disconnect_reason(), Some(DisconnectReason::Close));
}
