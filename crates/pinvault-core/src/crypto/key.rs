//! Key derivation from a numeric PIN.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 at a fixed work factor. The
//! iteration count is part of the on-disk format: every stored PIN hash and
//! every encrypted file payload was produced with it, so changing it would
//! silently invalidate all previously persisted material.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

/// Salt length in bytes.
pub const SALT_LENGTH: usize = 16;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// Derived key length in bytes (256 bits for AES-256).
pub const KEY_LENGTH: usize = 32;

/// PBKDF2-HMAC-SHA256 iteration count. Frozen; see module docs.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A symmetric key derived from a PIN.
///
/// Key material is zeroized from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Get a reference to the raw key bytes.
    ///
    /// Use only for immediate cryptographic operations; never persist or
    /// log this value.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from a PIN and a 16-byte salt.
///
/// Deterministic: the same PIN and salt always produce the same key, which
/// is what makes stored PIN hashes and per-file decryption possible.
pub fn derive_key(pin: &str, salt: &[u8; SALT_LENGTH]) -> DerivedKey {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    DerivedKey { key }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Generate a fresh random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generate an unguessable identifier: 16 random bytes as lowercase hex.
///
/// Used for file and session ids. Never derived from time or counters.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
