//! Cryptographic operations for the vault.
//!
//! This module provides the PIN-derived encryption pipeline:
//! - **PBKDF2-HMAC-SHA256**: key derivation at a frozen work factor
//! - **AES-256-GCM**: authenticated encryption with a 128-bit tag
//! - Constant-time PIN verification against a stored salted hash
//! - Versioned encrypted backup envelopes
//!
//! ## Security Model
//!
//! - No raw PIN or derived key is ever persisted; only `base64(salt || key)`
//! - Fresh salt and nonce per encryption operation, never reused
//! - Key material zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the vault store file
//! - Offline brute-force attacks on the PIN (bounded by the KDF work factor)
//! - Timing attacks on PIN verification
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked session / memory

pub mod backup;
pub mod cipher;
pub mod key;
pub mod pin_hash;

pub use backup::{create_backup, restore_from_backup, BACKUP_VERSION};
pub use cipher::{decrypt, decrypt_text, encrypt, encrypt_text, Encrypted};
pub use key::{
    derive_key, generate_id, generate_nonce, generate_salt, DerivedKey, NONCE_LENGTH,
    PBKDF2_ITERATIONS, SALT_LENGTH,
};
pub use pin_hash::{hash_pin, verify_pin};
