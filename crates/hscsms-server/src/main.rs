// ============================================
// File: crates/hscsms-server/src/main.rs
// ============================================
//! # hscsms Server Entry Point
//!
//! ## Creation Reason
//! Main entry point for the hscsms server binary.
//! Handles CLI parsing, logging setup, and server initialization.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Server execution until Ctrl+C
//!
//! ## Usage
//! ```bash
//! hscsms-server start --config server.toml
//! hscsms-server validate --config server.toml   # Print effective config
//! hscsms-server keygen --bits 2048              # Throwaway key (troubleshooting)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A missing config file means defaults, not an error
//! - `RUST_LOG` overrides `logging.level`
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hscsms_core::crypto::AsymmetricProfile;
use hscsms_server::{Server, ServerConfig};

// ============================================
// CLI Definition
// ============================================

/// hscsms server
#[derive(Parser, Debug)]
#[command(name = "hscsms-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "server.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "server.toml")]
        config: PathBuf,
    },

    /// Generate a throwaway RSA key pair and print its public half
    #[command(hide = true)]
    Keygen {
        /// Modulus size in bits
        #[arg(long, default_value_t = 1024)]
        bits: usize,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Keygen { bits } => cmd_keygen(bits).await,
    };

    // Handle errors
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    init_logging(&config.logging.level);

    info!("Starting hscsms server...");

    let server = Arc::new(Server::bind(config).await?);
    let mut runner = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal");
            server.shutdown();
            runner.await??;
        }
        result = &mut runner => {
            result??;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    init_logging("warn");

    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Server will use default values.");
    }

    let config = load_or_default_config(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:          {}", config.listen_addr());
    println!();
    println!("Security:");
    println!("   RSA key bits:    {}", config.security.rsa_key_bits);
    println!("   AES key bits:    {}", config.security.symmetric_key_bits);
    println!();
    println!("Limits:");
    println!("   Max clients:     {}", config.limits.max_clients);
    println!("   Max frame size:  {}", config.limits.max_frame_size);
    match config.limits.read_timeout_secs {
        Some(secs) => println!("   Read timeout:    {secs}s"),
        None => println!("   Read timeout:    none"),
    }
    println!();
    println!("Effective TOML:");
    println!("{}", config.to_toml());

    Ok(())
}

async fn cmd_keygen(bits: usize) -> anyhow::Result<()> {
    init_logging("warn");

    let profile = tokio::task::spawn_blocking(move || AsymmetricProfile::generate(bits)).await??;
    println!("Public key:  {}", profile.encode_public_key()?);
    println!("Fingerprint: {}", profile.fingerprint());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

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

/// Loads config, or returns defaults when the file does not exist.
async fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path).await?)
    } else {
        Ok(ServerConfig::default())
    }
}
