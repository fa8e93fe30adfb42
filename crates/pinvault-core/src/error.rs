//! Error types for vault core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps these to
//! user-friendly messages. The taxonomy deliberately distinguishes
//! recoverable conditions (validation, authentication, lockout) from
//! storage and initialization failures.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The candidate PIN violated one or more policy rules.
    /// Carries the full list of violations, not just the first.
    #[error("PIN rejected: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Wrong PIN submitted while the vault was locked.
    /// The failed attempt has already been persisted when this is returned.
    #[error("incorrect PIN ({attempts_remaining} attempts remaining)")]
    Authentication { attempts_remaining: u32 },

    /// A PIN was submitted during an active lockout window.
    /// No PIN is checked and no state is mutated in this case.
    #[error("vault locked out for {seconds_remaining} more seconds")]
    LockedOut { seconds_remaining: i64 },

    /// Authentication tag verification failed during decryption.
    /// Deliberately does not reveal whether the cause was a wrong PIN
    /// or corrupted ciphertext.
    #[error("decryption failed")]
    Decryption,

    /// Malformed backup envelope.
    #[error("invalid backup format: {0}")]
    BackupFormat(String),

    /// Cipher or key-derivation setup error (not a tag failure).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Underlying persistence operation failed. For composite operations
    /// the message names the collection that failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistent store unavailable at startup. Fatal for the vault
    /// subsystem until resolved.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// An operation requiring a configured PIN was invoked before setup.
    #[error("no PIN has been set up")]
    PinNotSet,

    /// Setup was attempted while a PIN configuration already exists.
    #[error("a PIN is already configured")]
    PinAlreadySet,

    /// A file operation was attempted while the vault was not unlocked.
    #[error("vault is locked")]
    Locked,
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        VaultError::Storage(format!("SQLite error: {}", err))
    }
}
