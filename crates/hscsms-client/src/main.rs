// ============================================
// File: crates/hscsms-client/src/main.rs
// ============================================
//! # hscsms Client Entry Point
//!
//! ## Creation Reason
//! Command-line client for poking at a running hscsms server.
//!
//! ## Usage
//! ```bash
//! hscsms-client connect --addr 127.0.0.1:5050
//! > /create alice s3cret
//! > /login alice s3cret
//! > /reconnect
//! > /quit
//!
//! hscsms-client create-user --addr 127.0.0.1:5050 --username alice --password s3cret
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hscsms_client::ClientSession;
use hscsms_core::protocol::protocol_registry;
use hscsms_transport::ConnectionConfig;

// ============================================
// CLI Definition
// ============================================

/// hscsms command-line client
#[derive(Parser, Debug)]
#[command(name = "hscsms-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect and read commands from stdin
    Connect {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:5050")]
        addr: SocketAddr,
    },

    /// Create one account and exit
    CreateUser {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:5050")]
        addr: SocketAddr,

        /// Account name
        #[arg(short, long)]
        username: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Connect { addr } => cmd_connect(addr).await,
        Commands::CreateUser {
            addr,
            username,
            password,
        } => cmd_create_user(addr, &username, &password).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

async fn open_session(addr: SocketAddr) -> anyhow::Result<ClientSession> {
    let registry = Arc::new(protocol_registry()?);
    let session = ClientSession::connect(addr, registry, ConnectionConfig::default()).await?;
    session.wait_ready().await?;
    info!("Connected to {}", addr);
    Ok(session)
}

async fn cmd_connect(addr: SocketAddr) -> anyhow::Result<()> {
    let session = open_session(addr).await?;
    println!("Commands: /create <user> <pass>, /login <user> <pass>, /reconnect, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["/create", user, pass] => match session.create_user(user, pass).await {
                Ok(id) => println!("created {user} (id {id})"),
                Err(e) => println!("create failed: {e}"),
            },
            ["/login", user, pass] => match session.login(user, pass).await {
                Ok(id) => println!("logged in as {user} (id {id})"),
                Err(e) => println!("login failed: {e}"),
            },
            ["/reconnect"] => {
                session.reconnect().await?;
                session.wait_ready().await?;
                println!("reconnected");
            }
            ["/quit"] => break,
            _ => println!("unknown command: {line}"),
        }

        if !session.is_connected() {
            match session.disconnect_reason() {
                Some(reason) => println!("disconnected by server ({reason}); use /reconnect"),
                None => println!("connection lost; use /reconnect"),
            }
        }
    }

    close(&session).await;
    Ok(())
}

async fn cmd_create_user(addr: SocketAddr, username: &str, password: &str) -> anyhow::Result<()> {
    let session = open_session(addr).await?;
    let id = session.create_user(username, password).await?;
    println!("{id}");
    close(&session).await;
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Says goodbye and waits (briefly) for the send queue to drain, since
/// dropping the session stops the connection outright.
async fn close(session: &ClientSession) {
    session.disconnect();
    for _ in 0..20 {
        if !session.is_connected() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
