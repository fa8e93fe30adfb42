//! Core data types for the vault store.
//!
//! Four collections back the vault: the PIN configuration singleton, the
//! encrypted files, their encryption metadata, and the unlock sessions.
//! File metadata (name, size, mime type, category, preview) is stored
//! unencrypted; only the file payload itself is ciphertext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{NONCE_LENGTH, SALT_LENGTH};

/// The PIN configuration singleton. Exists iff a PIN has been set up.
///
/// Only the salted hash of the PIN is ever stored here; see
/// [`crate::crypto::hash_pin`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinConfig {
    /// Encoded `base64(salt || derived_key)` hash of the PIN.
    pub hash: String,

    /// Failed unlock attempts since the last successful verification.
    /// Monotonically non-decreasing until a correct PIN resets it to 0.
    pub attempts: u32,

    /// End of the active lockout window, if any. The countdown is always
    /// recomputed from this timestamp, never cached.
    pub lockout_until: Option<DateTime<Utc>>,

    /// True until the first successful unlock after setup.
    pub is_first_time: bool,
}

/// Broad content category, inferred from the mime type at upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Image,
    Video,
    Document,
    Other,
}

impl FileCategory {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileCategory::Image
        } else if mime.starts_with("video/") {
            FileCategory::Video
        } else if mime.starts_with("text/") || mime == "application/pdf" {
            FileCategory::Document
        } else {
            FileCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Document => "document",
            FileCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "image" => FileCategory::Image,
            "video" => FileCategory::Video,
            "document" => FileCategory::Document,
            _ => FileCategory::Other,
        }
    }
}

/// A file stored in the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFile {
    /// Random 32-character hex identifier.
    pub id: String,

    /// Original file name (unencrypted).
    pub name: String,

    /// Plaintext size in bytes (unencrypted).
    pub size: u64,

    /// Mime type (unencrypted).
    pub mime_type: String,

    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,

    /// Authenticated-encrypted payload, tag included.
    pub ciphertext: Vec<u8>,

    /// Optional small unencrypted preview blob (e.g. thumbnail).
    pub preview: Option<Vec<u8>>,

    /// Content category inferred from the mime type.
    pub category: FileCategory,
}

/// Per-file encryption parameters. Required to decrypt; deleting a file
/// must remove this record too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    pub file_id: String,
    pub salt: [u8; SALT_LENGTH],
    pub nonce: [u8; NONCE_LENGTH],
}

impl EncryptionMetadata {
    /// Storage key for a metadata record: `"file_" + file_id`.
    pub fn storage_key(file_id: &str) -> String {
        format!("file_{}", file_id)
    }
}

/// One unlock event. Sessions are never deleted, only deactivated, so the
/// collection doubles as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}
