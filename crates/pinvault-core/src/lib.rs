//! # pinvault-core
//!
//! Core library for pinvault - a PIN-protected encrypted file vault.
//!
//! All encryption keys are derived on demand from the user's PIN; nothing
//! but a salted hash of the PIN is ever persisted. A forgotten PIN
//! permanently forfeits access to previously encrypted content: there is
//! no escrow and no recovery key.
//!
//! ## Architecture
//!
//! - **crypto**: key derivation, authenticated encryption, PIN hashing,
//!   backup envelopes
//! - **policy**: PIN validation rules and secure PIN generation
//! - **store**: persistent entity collections behind the `VaultStore` trait
//! - **vault**: the access controller state machine (attempts, lockout,
//!   sessions)
//!
//! The crypto and policy modules are stateless; the access controller is
//! the only component that mutates PIN configuration and session state.

pub mod crypto;
pub mod error;
pub mod policy;
pub mod store;
pub mod vault;

pub use error::{Result, VaultError};
pub use store::{SqliteVaultStore, VaultStore};
pub use vault::{Clock, SystemClock, Vault, VaultState, VaultStatus};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
