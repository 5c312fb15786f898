// ============================================
// File: crates/hscsms-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to transport layer operations: binding,
//! connecting, framing and socket I/O.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Error conversion from system and core errors
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Network Errors**: bind and connect failures, use after teardown
//! 2. **Framing Errors**: bad flag, oversized body, truncated frame
//! 3. **Configuration Errors**: Invalid addresses
//! 4. **System Errors**: Read timeouts
//!
//! ## ⚠️ Important Note for Next Developer
//! - Any error surfaced from the read loop ends the connection; this
//!   layer never retries
//! - The disconnect callback receives these errors by reference
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use hscsms_common::error::CommonError;
use hscsms_core::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
///
/// # Categories
/// - **Network**: Socket and network-related errors
/// - **Framing**: Wire-format violations that desynchronize the stream
/// - **Config**: Configuration and setup errors
/// - **System**: OS-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Failed to connect to a remote address.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Address we tried to reach
        addr: SocketAddr,
        /// Why connecting failed
        reason: String,
    },

    /// Connection is not active.
    #[error("Socket not connected")]
    NotConnected,

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    // ========================================
    // Framing Errors
    // ========================================

    /// The peer sent bytes that are not a valid frame.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// What was wrong
        reason: String,
    },

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // System Errors
    // ========================================

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from the core crate (encoding, cipher).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedFrame` error.
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    ///
    /// Transient errors may succeed if the operation is retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a network-related error.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. }
                | Self::ConnectFailed { .. }
                | Self::NotConnected
                | Self::AddressInUse { .. }
        )
    }

    /// Returns `true` if the peer broke the wire format.
    #[must_use]
    pub const fn is_framing_error(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. })
    }

    /// Returns `true` if the peer reset or dropped the connection.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
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
    fn test_error_display() {
        let err = TransportError::bind_failed("127.0.0.1:5050".parse().unwrap(), "address in use");
        assert!(err.to_string().contains("127.0.0.1:5050"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_error_classification() {
        let network_err = TransportError::connect_failed("127.0.0.1:5050".parse().unwrap(), "refused");
        assert!(network_err.is_network_error());
        assert!(network_err.is_retryable());

        let closed = TransportError::NotConnected;
        assert!(closed.is_network_error());
        assert!(!closed.is_retryable());

        let frame_err = TransportError::malformed_frame("bad flag");
        assert!(frame_err.is_framing_error());
        assert!(!frame_err.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        let transport_err: TransportError = io_err.into();
        assert!(transport_err.is_retryable());

        let lost = TransportError::io("reading frame", io::ErrorKind::ConnectionReset.into());
        assert!(lost.is_connection_lost());
    }

    #[test]
    fn test_core_error_wraps() {
        let err: TransportError = CoreError::Decryption.into();
        assert_eq!(err.to_string(), "Decryption failed");
    }
}
