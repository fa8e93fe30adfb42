//! Persistent entity store for the vault.
//!
//! Four named collections back the vault: the PIN configuration singleton,
//! encrypted files, per-file encryption metadata, and unlock sessions. The
//! access controller is the only component that mutates PIN configuration
//! and session state; it talks to the store through the [`VaultStore`]
//! trait so tests can run against an in-memory backend.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteVaultStore;
pub use traits::VaultStore;
pub use types::{EncryptionMetadata, FileCategory, PinConfig, VaultFile, VaultSession};
