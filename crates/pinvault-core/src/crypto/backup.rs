//! Encrypted backup envelopes.
//!
//! A backup wraps arbitrary serializable state in a versioned envelope
//! `{version, timestamp, ciphertext, salt, nonce}`, serialized as JSON and
//! base64-encoded into a single opaque string. The payload is encrypted
//! with the same PIN-derived AEAD pipeline as vault files.

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::cipher::{decrypt, encrypt};
use crate::crypto::key::{NONCE_LENGTH, SALT_LENGTH};
use crate::error::{Result, VaultError};

/// Current backup envelope version.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BackupEnvelope {
    version: u32,
    timestamp: DateTime<Utc>,
    ciphertext: String,
    salt: String,
    nonce: String,
}

/// Serialize `state`, encrypt it with `pin`, and wrap it in an envelope.
pub fn create_backup<T: Serialize>(state: &T, pin: &str) -> Result<String> {
    let plaintext = serde_json::to_vec(state)
        .map_err(|e| VaultError::BackupFormat(format!("failed to serialize state: {}", e)))?;

    let enc = encrypt(&plaintext, pin)?;

    let envelope = BackupEnvelope {
        version: BACKUP_VERSION,
        timestamp: Utc::now(),
        ciphertext: Base64.encode(&enc.ciphertext),
        salt: Base64.encode(enc.salt),
        nonce: Base64.encode(enc.nonce),
    };

    let json = serde_json::to_vec(&envelope)
        .map_err(|e| VaultError::BackupFormat(format!("failed to serialize envelope: {}", e)))?;
    Ok(Base64.encode(json))
}

fn decode_field<const N: usize>(value: &str, field: &str) -> Result<[u8; N]> {
    let bytes = Base64
        .decode(value)
        .map_err(|_| VaultError::BackupFormat(format!("{} is not valid base64", field)))?;
    bytes
        .try_into()
        .map_err(|_| VaultError::BackupFormat(format!("{} has the wrong length", field)))
}

/// Decode and decrypt a backup produced by [`create_backup`].
///
/// Fails with [`VaultError::BackupFormat`] when the envelope is malformed
/// (missing `version` or `ciphertext`, bad encodings) and with
/// [`VaultError::Decryption`] when the PIN is wrong or the payload is
/// corrupted.
pub fn restore_from_backup<T: DeserializeOwned>(blob: &str, pin: &str) -> Result<T> {
    let json = Base64
        .decode(blob.trim())
        .map_err(|_| VaultError::BackupFormat("backup is not valid base64".to_string()))?;

    let value: serde_json::Value = serde_json::from_slice(&json)
        .map_err(|_| VaultError::BackupFormat("backup envelope is not valid JSON".to_string()))?;

    // Required fields checked explicitly so the caller gets a precise error
    // before any cryptographic work happens.
    if value.get("version").is_none() {
        return Err(VaultError::BackupFormat("missing version".to_string()));
    }
    if value.get("ciphertext").is_none() {
        return Err(VaultError::BackupFormat("missing ciphertext".to_string()));
    }

    let envelope: BackupEnvelope = serde_json::from_value(value)
        .map_err(|e| VaultError::BackupFormat(format!("invalid envelope: {}", e)))?;

    let ciphertext = Base64
        .decode(&envelope.ciphertext)
        .map_err(|_| VaultError::BackupFormat("ciphertext is not valid base64".to_string()))?;
    let salt: [u8; SALT_LENGTH] = decode_field(&envelope.salt, "salt")?;
    let nonce: [u8; NONCE_LENGTH] = decode_field(&envelope.nonce, "nonce")?;

    let plaintext = decrypt(&ciphertext, pin, &salt, &nonce)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::BackupFormat(format!("invalid state payload: {}", e)))
}
