// ============================================
// File: crates/hscsms-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides foundational error types and result aliases used across
//! all hscsms crates, enabling consistent error handling.
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for common operations
//! - `Result<T>`: Type alias using `CommonError`
//! - `is_retryable` classification
//!
//! ## Design Philosophy
//! - Use `thiserror` for ergonomic error definitions
//! - Each crate defines its own error type that wraps `CommonError`
//! - Errors should be informative without leaking key material
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include keys, passwords or challenge strings in error messages
//! - Crate errors wrap this type with `#[from]`
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across hscsms crates.
///
/// # Categories
/// - **IO**: System I/O errors surfaced through non-async adapters
/// - **State**: Lifecycle calls made in the wrong order
///
/// # Example
/// ```
/// use hscsms_common::error::{CommonError, Result};
///
/// fn start(started: bool) -> Result<()> {
///     if started {
///         return Err(CommonError::invalid_state("idle", "started"));
///     }
///     Ok(())
/// }
///
/// assert!(start(true).is_err());
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // IO Errors
    // ========================================

    /// System I/O error occurred.
    #[error("I/O error: {context}")]
    Io {
        /// What operation was being performed
        context: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    // ========================================
    // State Errors
    // ========================================

    /// Operation not valid in current state.
    #[error("Invalid state: expected {expected}, found {current}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Current state
        current: String,
    },
}

impl CommonError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(expected: impl Into<String>, current: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            current: current.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
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
        let err = CommonError::invalid_state("idle", "started");
        assert_eq!(err.to_string(), "Invalid state: expected idle, found started");
    }

    #[test]
    fn test_error_classification() {
        let state_err = CommonError::invalid_state("idle", "started");
        assert!(!state_err.is_retryable());

        let io_err = CommonError::io("reading block", std::io::Error::other("reset"));
        assert!(io_err.is_retryable());
        assert!(io_err.to_string().contains("reading block"));
    }
}
