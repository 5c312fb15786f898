// ============================================
// File: crates/hscsms-server/src/services/users.rs
// ============================================
//! # User Store
//!
//! ## Creation Reason
//! The login state needs somewhere to create and check accounts. The
//! real object store is a separate system; this module defines the seam
//! it plugs into and an in-memory implementation for tests and the
//! stock binary.
//!
//! ## Main Functionality
//! - `UserStore`: create/authenticate interface
//! - `InMemoryUserStore`: DashMap-backed implementation
//! - `UserStoreError`: failure reasons, each with a stable wire string
//!
//! ## Password Storage
//! ```text
//! digest = SHA-256(salt ‖ password)     salt: 16 random bytes per user
//! ```
//! Digests are compared with `subtle::ConstantTimeEq`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `UserStoreError::reason()` strings are sent to clients; keep them stable
//! - Store calls run inline on a connection's read task, so a slow
//!   backend stalls that connection
//!
//! ## Last Modified
//! v0.1.0 - Initial user store

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info};

/// Opaque user identifier returned to clients.
pub type UserId = String;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 32;

const SALT_LEN: usize = 16;

// ============================================
// UserStoreError
// ============================================

/// Why a create or login request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStoreError {
    /// Empty, too long, or contains whitespace.
    #[error("invalid username")]
    InvalidUsername,

    /// Username already taken.
    #[error("user already exists")]
    UserExists,

    /// No such user.
    #[error("unknown user")]
    UnknownUser,

    /// Password does not match.
    #[error("invalid password")]
    InvalidPassword,
}

impl UserStoreError {
    /// Stable reason string carried in `ClientboundLoginResult`.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidUsername => "invalid_username",
            Self::UserExists => "user_exists",
            Self::UnknownUser => "unknown_user",
            Self::InvalidPassword => "invalid_password",
        }
    }
}

// ============================================
// UserStore
// ============================================

/// Account backend used by the login state.
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Creates an account and returns its id.
    ///
    /// # Errors
    /// `InvalidUsername` or `UserExists`.
    fn create_user(&self, username: &str, password: &str) -> Result<UserId, UserStoreError>;

    /// Checks credentials and returns the account id.
    ///
    /// # Errors
    /// `UnknownUser` or `InvalidPassword`.
    fn authenticate(&self, username: &str, password: &str) -> Result<UserId, UserStoreError>;
}

// ============================================
// InMemoryUserStore
// ============================================

struct StoredUser {
    id: UserId,
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
}

/// Process-local accounts. Lost on restart.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, StoredUser>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if no account exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn digest(salt: &[u8; SALT_LEN], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn validate_username(username: &str) -> Result<(), UserStoreError> {
    if username.is_empty()
        || username.chars().count() > MAX_USERNAME_LEN
        || username.chars().any(char::is_whitespace)
    {
        return Err(UserStoreError::InvalidUsername);
    }
    Ok(())
}

impl UserStore for InMemoryUserStore {
    fn create_user(&self, username: &str, password: &str) -> Result<UserId, UserStoreError> {
        validate_username(username)?;

        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => {
                debug!(username, "Create refused: user exists");
                Err(UserStoreError::UserExists)
            }
            Entry::Vacant(slot) => {
                let mut rng = rand::thread_rng();
                let mut salt = [0u8; SALT_LEN];
                rng.fill_bytes(&mut salt);
                let mut raw_id = [0u8; 8];
                rng.fill_bytes(&mut raw_id);

                let id = hex::encode(raw_id);
                slot.insert(StoredUser {
                    id: id.clone(),
                    salt,
                    digest: digest(&salt, password),
                });
                info!(username, user_id = %id, "User created");
                Ok(id)
            }
        }
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<UserId, UserStoreError> {
        let user = self
            .users
            .get(username)
            .ok_or(UserStoreError::UnknownUser)?;

        let candidate = digest(&user.salt, password);
        if bool::from(candidate.ct_eq(&user.digest)) {
            Ok(user.id.clone())
        } else {
            Err(UserStoreError::InvalidPassword)
        }
    }
}

impl std::fmt::Debug for InMemoryUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUserStore")
            .field("users", &self.users.len())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_authenticate() {
        let store = InMemoryUserStore::new();
        let id = store.create_user("alice", "s3cret").unwrap();
        assert_eq!(id.len(), 16);
        assert_eq!(store.authenticate("alice", "s3cret").unwrap(), id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failure_reasons() {
        let store = InMemoryUserStore::new();
        store.create_user("bob", "pw").unwrap();

        assert_eq!(store.create_user("bob", "other"), Err(UserStoreError::UserExists));
        assert_eq!(store.authenticate("carol", "pw"), Err(UserStoreError::UnknownUser));
        assert_eq!(store.authenticate("bob", "PW"), Err(UserStoreError::InvalidPassword));
        assert_eq!(UserStoreError::InvalidPassword.reason(), "invalid_password");
    }

    #[test]
    fn test_username_rules() {
        let store = InMemoryUserStore::new();
        for bad in ["", "has space", "tab\tname", &"x".repeat(MAX_USERNAME_LEN + 1)] {
            assert_eq!(
                store.create_user(bad, "pw"),
                Err(UserStoreError::InvalidUsername),
                "{bad:?}"
            );
        }
        assert!(store.create_user(&"x".repeat(MAX_USERNAME_LEN), "pw").is_ok());
        assert!(store.create_user("ünïcode", "").is_ok());
    }

    #[test]
    fn test_same_password_different_digest() {
        let store = InMemoryUserStore::new();
        store.create_user("a", "same").unwrap();
        store.create_user("b", "same").unwrap();
        let a = store.users.get("a").unwrap().digest;
        let b = store.users.get("b").unwrap().digest;
        assert_ne!(a, b);
    }
}
