// ============================================
// File: crates/hscsms-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use hscsms_core::error::CoreError;
use hscsms_transport::error::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The handshake did not complete.
    #[error("Handshake failed: {reason}")]
    HandshakeFailed {
        /// What went wrong
        reason: String,
    },

    /// An operation that needs the session key ran before the handshake
    /// finished.
    #[error("Session is not ready")]
    NotReady,

    /// The server answered a create-user or login request with a failure.
    #[error("Request rejected: {reason}")]
    Rejected {
        /// Reason string sent by the server
        reason: String,
    },

    /// The connection closed while waiting for an answer.
    #[error("Disconnected")]
    Disconnected,

    /// No answer in time.
    #[error("Timed out waiting for {operation}")]
    Timeout {
        /// What was being waited for
        operation: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn handshake_failed(reason: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns `true` for a server-side refusal, as opposed to a failure
    /// of the session itself.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns `true` if the session is unusable and needs `reconnect`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailed { .. } | Self::Disconnected | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let rejected = ClientError::rejected("user_exists");
        assert!(rejected.is_rejection());
        assert!(!rejected.is_fatal());
        assert_eq!(rejected.to_string(), "Request rejected: user_exists");

        assert!(ClientError::handshake_failed("kicked").is_fatal());
        assert!(ClientError::from(TransportError::NotConnected).is_fatal());
    }
}
