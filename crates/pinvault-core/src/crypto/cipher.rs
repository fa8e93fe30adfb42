//! Authenticated encryption of vault payloads.
//!
//! AES-256-GCM with a key derived from the PIN. Every call to [`encrypt`]
//! generates a fresh salt and nonce; reusing either across two encryptions
//! is a protocol violation, so there is deliberately no API that accepts a
//! caller-supplied salt or nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use crate::crypto::key::{
    derive_key, generate_nonce, generate_salt, NONCE_LENGTH, SALT_LENGTH,
};
use crate::error::{Result, VaultError};

/// Output of an encryption operation.
///
/// The ciphertext carries the 128-bit authentication tag appended by the
/// AEAD. Salt and nonce are required for decryption and are stored
/// unencrypted alongside the ciphertext.
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub salt: [u8; SALT_LENGTH],
    pub nonce: [u8; NONCE_LENGTH],
}

fn cipher_for(pin: &str, salt: &[u8; SALT_LENGTH]) -> Result<Aes256Gcm> {
    let key = derive_key(pin, salt);
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Crypto(format!("invalid key length: {}", e)))
}

/// Encrypt a byte buffer under a key derived from `pin`.
///
/// Generates a fresh salt and a fresh nonce for this operation only.
pub fn encrypt(plaintext: &[u8], pin: &str) -> Result<Encrypted> {
    let salt = generate_salt();
    let nonce = generate_nonce();
    let cipher = cipher_for(pin, &salt)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

    Ok(Encrypted {
        ciphertext,
        salt,
        nonce,
    })
}

/// Decrypt a byte buffer, verifying the authentication tag.
///
/// Fails with [`VaultError::Decryption`] whenever the tag does not verify.
/// The error does not distinguish a wrong PIN from corrupted ciphertext.
pub fn decrypt(
    ciphertext: &[u8],
    pin: &str,
    salt: &[u8; SALT_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
) -> Result<Vec<u8>> {
    let cipher = cipher_for(pin, salt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Decryption)
}

/// Encrypt a UTF-8 string.
pub fn encrypt_text(text: &str, pin: &str) -> Result<Encrypted> {
    encrypt(text.as_bytes(), pin)
}

/// Decrypt a payload produced by [`encrypt_text`].
pub fn decrypt_text(
    ciphertext: &[u8],
    pin: &str,
    salt: &[u8; SALT_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
) -> Result<String> {
    let plaintext = decrypt(ciphertext, pin, salt, nonce)?;
    String::from_utf8(plaintext)
        .map_err(|_| VaultError::Crypto("decrypted payload is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let plaintext = b"secret file contents";
        let enc = encrypt(plaintext, "4821").unwrap();
        let decrypted = decrypt(&enc.ciphertext, "4821", &enc.salt, &enc.nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_pin_fails_decryption() {
        let enc = encrypt(b"secret", "4821").unwrap();
        let result = decrypt(&enc.ciphertext, "0000", &enc.salt, &enc.nonce);
        assert!(matches!(result, Err(VaultError::Decryption)));
    }

    #[test]
    fn test_corrupted_ciphertext_fails_decryption() {
        let mut enc = encrypt(b"secret", "4821").unwrap();
        let mid = enc.ciphertext.len() / 2;
        enc.ciphertext[mid] ^= 0xFF;
        let result = decrypt(&enc.ciphertext, "4821", &enc.salt, &enc.nonce);
        assert!(matches!(result, Err(VaultError::Decryption)));
    }

    #[test]
    fn test_ciphertext_carries_tag_overhead() {
        let plaintext = b"payload";
        let enc = encrypt(plaintext, "4821").unwrap();
        // 16-byte GCM tag appended to the ciphertext
        assert_eq!(enc.ciphertext.len(), plaintext.len() + 16);
    }

    #[test]
    fn test_salt_nonce_never_reused() {
        // Probabilistic uniqueness: repeated encryptions of the same
        // plaintext under the same PIN must never repeat a (salt, nonce).
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let enc = encrypt(b"same payload", "4821").unwrap();
            assert!(seen.insert((enc.salt, enc.nonce)));
        }
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let enc = encrypt(b"", "4821").unwrap();
        let decrypted = decrypt(&enc.ciphertext, "4821", &enc.salt, &enc.nonce).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_text_round_trip() {
        let enc = encrypt_text("hidden note", "4821").unwrap();
        let text = decrypt_text(&enc.ciphertext, "4821", &enc.salt, &enc.nonce).unwrap();
        assert_eq!(text, "hidden note");
    }
}
