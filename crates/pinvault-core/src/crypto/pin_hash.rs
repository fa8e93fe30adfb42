//! PIN hashing and verification.
//!
//! The only representation of the PIN ever persisted is
//! `base64(salt || derived_key_bytes)`. Verification re-derives the key from
//! the candidate PIN and the stored salt and compares in constant time.

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use zeroize::Zeroize;

use crate::crypto::key::{derive_key, generate_salt, KEY_LENGTH, SALT_LENGTH};

/// Hash a PIN for storage: fresh salt, derive key, encode `salt || key`.
pub fn hash_pin(pin: &str) -> String {
    let salt = generate_salt();
    let key = derive_key(pin, &salt);

    let mut buf = Vec::with_capacity(SALT_LENGTH + KEY_LENGTH);
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(key.as_bytes());
    let encoded = Base64.encode(&buf);
    buf.zeroize();
    encoded
}

/// Verify a PIN against a stored hash.
///
/// Structural failures (bad encoding, truncated payload) return `false`
/// immediately; no timing guarantee is needed there because nothing about
/// the PIN has been examined yet. The byte comparison itself runs in time
/// independent of where, or whether, a mismatch occurs.
pub fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    let Ok(decoded) = Base64.decode(stored_hash) else {
        return false;
    };
    if decoded.len() <= SALT_LENGTH {
        return false;
    }

    let (salt_bytes, stored_key) = decoded.split_at(SALT_LENGTH);
    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(salt_bytes);

    let derived = derive_key(pin, &salt);
    constant_time_eq(derived.as_bytes(), stored_key)
}

/// Constant-time equality: accumulate an OR of XORs across every byte
/// position and test the accumulator once at the end. Short-circuiting
/// equality would reintroduce a timing side channel here.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
