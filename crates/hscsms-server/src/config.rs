// ============================================
// File: crates/hscsms-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the hscsms server, loaded from
//! a TOML file.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Conversion into the transport's `ConnectionConfig`
//!
//! ## Configuration Sections
//! - `network`: TCP listen address
//! - `security`: RSA and AES key sizes
//! - `limits`: Client count, frame size, read timeout
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:5050"
//!
//! [security]
//! rsa_key_bits = 2048
//! symmetric_key_bits = 128
//!
//! [limits]
//! max_clients = 1000
//! max_frame_size = 16777216
//! read_timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - The RSA key is generated at startup and never written to disk
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use hscsms_transport::ConnectionConfig;

use crate::error::{Result, ServerError};

/// Smallest accepted RSA modulus.
pub const MIN_RSA_KEY_BITS: usize = 1024;
/// Largest accepted RSA modulus.
pub const MAX_RSA_KEY_BITS: usize = 4096;

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Key sizes.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.security.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns listen address (from network config).
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        self.network.listen_addr
    }

    /// Builds the per-connection limits.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_frame_size: self.limits.max_frame_size,
            read_timeout: self.limits.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP listen address. Port 0 picks a free port.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5050))
}

impl NetworkConfig {
    #[allow(clippy::unnecessary_wraps)]
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// SecurityConfig
// ============================================

/// Key size configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Modulus size of the top-level RSA key pair.
    #[serde(default = "default_rsa_key_bits")]
    pub rsa_key_bits: usize,

    /// Session key size. Only AES-128 is spoken.
    #[serde(default = "default_symmetric_key_bits")]
    pub symmetric_key_bits: usize,
}

fn default_rsa_key_bits() -> usize {
    1024
}

fn default_symmetric_key_bits() -> usize {
    128
}

impl SecurityConfig {
    fn validate(&self) -> Result<()> {
        if !(MIN_RSA_KEY_BITS..=MAX_RSA_KEY_BITS).contains(&self.rsa_key_bits) {
            return Err(ServerError::config_invalid(
                "security.rsa_key_bits",
                format!("must be between {MIN_RSA_KEY_BITS} and {MAX_RSA_KEY_BITS}"),
            ));
        }

        if self.rsa_key_bits % 8 != 0 {
            return Err(ServerError::config_invalid(
                "security.rsa_key_bits",
                "must be a multiple of 8",
            ));
        }

        if self.symmetric_key_bits != 128 {
            return Err(ServerError::config_invalid(
                "security.symmetric_key_bits",
                "only 128 is supported",
            ));
        }

        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: default_rsa_key_bits(),
            symmetric_key_bits: default_symmetric_key_bits(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent clients. Extra connections are kicked.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Largest accepted frame body, in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Per-frame read timeout; unset waits forever.
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
}

fn default_max_clients() -> usize {
    1000
}

fn default_max_frame_size() -> usize {
    hscsms_core::protocol::DEFAULT_MAX_FRAME_SIZE
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_clients",
                "must be greater than 0",
            ));
        }

        if self.max_frame_size == 0 || u32::try_from(self.max_frame_size).is_err() {
            return Err(ServerError::config_invalid(
                "limits.max_frame_size",
                "must be between 1 and 4294967295",
            ));
        }

        if self.read_timeout_secs == Some(0) {
            return Err(ServerError::config_invalid(
                "limits.read_timeout_secs",
                "must be greater than 0 when set",
            ));
        }

        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            max_frame_size: default_max_frame_size(),
            read_timeout_secs: None,
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 5050);
        assert_eq!(config.security.rsa_key_bits, 1024);
        assert_eq!(config.connection_config(), ConnectionConfig::default());
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [network]
            listen_addr = "127.0.0.1:6060"

            [security]
            rsa_key_bits = 2048
            symmetric_key_bits = 128

            [limits]
            max_clients = 10
            max_frame_size = 65536
            read_timeout_secs = 30

            [logging]
            level = "debug"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert_eq!(config.network.listen_addr.port(), 6060);
        assert_eq!(config.security.rsa_key_bits, 2048);
        assert_eq!(config.limits.max_clients, 10);
        assert_eq!(config.logging.level, "debug");

        let conn = config.connection_config();
        assert_eq!(conn.max_frame_size, 65536);
        assert_eq!(conn.read_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ServerConfig::from_str("[limits]\nmax_clients = 5\n").unwrap();
        assert_eq!(config.limits.max_clients, 5);
        assert_eq!(config.limits.read_timeout_secs, None);
        assert_eq!(config.network.listen_addr, default_listen_addr());
    }

    #[test]
    fn test_rejects_bad_key_sizes() {
        for body in [
            "[security]\nrsa_key_bits = 512\n",
            "[security]\nrsa_key_bits = 8192\n",
            "[security]\nrsa_key_bits = 2049\n",
            "[security]\nsymmetric_key_bits = 256\n",
        ] {
            let err = ServerConfig::from_str(body).unwrap_err();
            assert!(err.is_config_error(), "{body}");
        }
    }

    #[test]
    fn test_rejects_bad_limits() {
        assert!(ServerConfig::from_str("[limits]\nmax_clients = 0\n").is_err());
        assert!(ServerConfig::from_str("[limits]\nmax_frame_size = 0\n").is_err());
        assert!(ServerConfig::from_str("[limits]\nread_timeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut config = ServerConfig::default();
        config.limits.read_timeout_secs = Some(12);
        let reparsed = ServerConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(reparsed.limits.read_timeout_secs, Some(12));
        assert_eq!(reparsed.security.rsa_key_bits, 1024);
    }
}
