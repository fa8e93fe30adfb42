//! Vault store trait definition.
//!
//! The `VaultStore` trait defines the interface the access controller uses
//! for durable state. This abstraction keeps the controller testable against
//! an in-memory store and allows alternative backends without changing the
//! lockout or session logic.

use super::types::{EncryptionMetadata, PinConfig, VaultFile, VaultSession};
use crate::error::Result;

/// Persistent entity store backing the vault.
///
/// All implementations must ensure:
/// - `put` operations are atomic create-or-replace
/// - Each collection serializes its own operations (callers hold no locks)
/// - Composite operations report which collection failed
pub trait VaultStore: Send {
    // --- PIN configuration (singleton) ---

    /// Get the PIN configuration, or `None` before first-time setup.
    fn pin_config(&self) -> Result<Option<PinConfig>>;

    /// Create or replace the PIN configuration.
    fn put_pin_config(&self, config: &PinConfig) -> Result<()>;

    /// Remove the PIN configuration. Only the explicit vault-reset path
    /// may call this.
    fn delete_pin_config(&self) -> Result<()>;

    // --- Files ---

    /// Create or replace a file record.
    fn put_file(&self, file: &VaultFile) -> Result<()>;

    /// Get a file by id.
    fn file(&self, id: &str) -> Result<Option<VaultFile>>;

    /// List all files, newest first.
    fn list_files(&self) -> Result<Vec<VaultFile>>;

    /// Delete a single file record, leaving its metadata untouched.
    /// Prefer [`VaultStore::delete_file_with_metadata`].
    fn delete_file(&self, id: &str) -> Result<()>;

    // --- Encryption metadata ---

    /// Create or replace the metadata record for a file.
    fn put_metadata(&self, meta: &EncryptionMetadata) -> Result<()>;

    /// Get the metadata record for a file.
    fn metadata(&self, file_id: &str) -> Result<Option<EncryptionMetadata>>;

    // --- Sessions ---

    /// Create or replace a session record.
    fn put_session(&self, session: &VaultSession) -> Result<()>;

    /// Get a session by id.
    fn session(&self, id: &str) -> Result<Option<VaultSession>>;

    /// List all sessions, newest first.
    fn list_sessions(&self) -> Result<Vec<VaultSession>>;

    // --- Composite operations ---

    /// Remove a file and its encryption metadata as one operation.
    ///
    /// Returns `NotFound` if no such file exists. On partial failure the
    /// error names the collection that failed; an orphaned metadata record
    /// is tolerable, an orphaned file without metadata is not.
    fn delete_file_with_metadata(&self, id: &str) -> Result<()>;

    /// Wipe all four collections. On failure the error names the first
    /// collection whose clear failed.
    fn clear_all(&self) -> Result<()>;
}
