//! Access controller: the vault state machine.
//!
//! Composes the cipher engine, PIN policy and store. Tracks failed unlock
//! attempts, enforces lockout, and owns session lifecycle. This is the only
//! component permitted to mutate PIN configuration and session state.
//!
//! Lockout is a pure function of `(now, lockout_until)`: nothing caches a
//! "locked out" boolean or a seconds-remaining counter, so the state machine
//! stays correct across process restarts mid-lockout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, create_backup, restore_from_backup};
use crate::error::{Result, VaultError};
use crate::policy;
use crate::store::{
    EncryptionMetadata, FileCategory, PinConfig, VaultFile, VaultSession, VaultStore,
};

/// Failed attempts tolerated before lockout.
pub const MAX_ATTEMPTS: u32 = 5;

/// Lockout window after the attempt limit is reached.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Idle time after which an unlock session is swept.
pub const SESSION_IDLE_MINUTES: i64 = 5;

/// Time source seam. Production uses [`SystemClock`]; tests drive a manual
/// clock to simulate lockout expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Externally observable vault state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VaultState {
    /// No PIN has been configured yet.
    NoPin,
    /// A PIN exists; the vault is locked.
    Locked { attempts: u32 },
    /// Too many failures; submissions are rejected until `until`.
    LockedOut { until: DateTime<Utc> },
    /// A session is live.
    Unlocked { session_id: String },
}

/// Snapshot returned by [`Vault::status`].
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    pub state: VaultState,
    /// Present while `Locked`.
    pub attempts_remaining: Option<u32>,
    /// Present while `LockedOut`.
    pub lockout_seconds_remaining: Option<i64>,
}

/// Everything needed to rebuild the file collections, wrapped in the
/// encrypted backup envelope by [`Vault::export_backup`].
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultExport {
    pub files: Vec<VaultFile>,
    pub metadata: Vec<EncryptionMetadata>,
}

struct LiveSession {
    session_id: String,
    // Retained for per-file key derivation while unlocked; wiped on lock.
    pin: Zeroizing<String>,
}

/// The vault access controller.
///
/// Constructed once at startup and passed by handle to every consumer;
/// there is no ambient global instance.
pub struct Vault<S: VaultStore> {
    store: S,
    clock: Box<dyn Clock>,
    live: Option<LiveSession>,
}

impl<S: VaultStore> Vault<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            live: None,
        }
    }

    /// Entry point for the external activation signal. Carries no payload;
    /// sweeps stale sessions and reports where the UI should route.
    pub fn activate(&mut self) -> Result<VaultStatus> {
        self.sweep_idle_sessions()?;
        self.status()
    }

    /// Current state, recomputed from the store and the clock.
    pub fn status(&self) -> Result<VaultStatus> {
        let Some(config) = self.store.pin_config()? else {
            return Ok(VaultStatus {
                state: VaultState::NoPin,
                attempts_remaining: None,
                lockout_seconds_remaining: None,
            });
        };

        if let Some(live) = &self.live {
            return Ok(VaultStatus {
                state: VaultState::Unlocked {
                    session_id: live.session_id.clone(),
                },
                attempts_remaining: None,
                lockout_seconds_remaining: None,
            });
        }

        let now = self.clock.now();
        if let Some(until) = config.lockout_until {
            if now < until {
                return Ok(VaultStatus {
                    state: VaultState::LockedOut { until },
                    attempts_remaining: None,
                    lockout_seconds_remaining: Some((until - now).num_seconds().max(1)),
                });
            }
        }

        // An expired lockout reads as Locked again, attempts untouched.
        Ok(VaultStatus {
            state: VaultState::Locked {
                attempts: config.attempts,
            },
            attempts_remaining: Some(MAX_ATTEMPTS.saturating_sub(config.attempts)),
            lockout_seconds_remaining: None,
        })
    }

    /// First-time PIN setup. Validates the PIN, persists its hash, and
    /// unlocks the vault.
    pub fn setup_pin(&mut self, pin: &str) -> Result<VaultStatus> {
        if self.store.pin_config()?.is_some() {
            return Err(VaultError::PinAlreadySet);
        }

        let validation = policy::validate(pin);
        if !validation.valid {
            return Err(VaultError::Validation(validation.errors));
        }

        let config = PinConfig {
            hash: crypto::hash_pin(pin),
            attempts: 0,
            lockout_until: None,
            is_first_time: true,
        };
        self.store.put_pin_config(&config)?;

        let session_id = self.start_session(pin)?;
        info!("vault set up and unlocked (session {})", session_id);
        self.status()
    }

    /// Submit a PIN against the locked vault.
    ///
    /// During an active lockout the PIN is not examined at all. A failed
    /// attempt is persisted before the caller learns about it, so a crash
    /// between verification and persistence cannot under-count.
    pub fn submit_pin(&mut self, pin: &str) -> Result<VaultStatus> {
        let mut config = self.store.pin_config()?.ok_or(VaultError::PinNotSet)?;
        let now = self.clock.now();

        if let Some(until) = config.lockout_until {
            if now < until {
                return Err(VaultError::LockedOut {
                    seconds_remaining: (until - now).num_seconds().max(1),
                });
            }
        }

        if crypto::verify_pin(pin, &config.hash) {
            config.attempts = 0;
            config.lockout_until = None;
            config.is_first_time = false;
            self.store.put_pin_config(&config)?;

            let session_id = self.start_session(pin)?;
            info!("vault unlocked (session {})", session_id);
            return self.status();
        }

        config.attempts += 1;
        if config.attempts >= MAX_ATTEMPTS {
            config.lockout_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
        }
        // Persist first, report second.
        self.store.put_pin_config(&config)?;

        let attempts_remaining = MAX_ATTEMPTS.saturating_sub(config.attempts);
        warn!("failed unlock attempt ({} recorded)", config.attempts);
        Err(VaultError::Authentication { attempts_remaining })
    }

    /// End the live session and relock the vault. The session record is
    /// deactivated, never deleted.
    pub fn close_vault(&mut self) -> Result<VaultStatus> {
        if let Some(live) = self.live.take() {
            if let Err(e) = self.deactivate_session(&live.session_id) {
                // The key material is wiped regardless; the stale session
                // record will be caught by the next idle sweep.
                warn!("failed to persist close of session {}: {}", live.session_id, e);
            } else {
                info!("vault closed (session {})", live.session_id);
            }
        }
        self.status()
    }

    /// Encrypt and store a file. Unlocked only.
    pub fn upload_file(
        &mut self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        preview: Option<Vec<u8>>,
    ) -> Result<String> {
        let pin = self.require_unlocked()?.pin.clone();

        // All writes happen only after the cryptographic work succeeded,
        // so an abandoned upload never leaves partial state.
        let encrypted = crypto::encrypt(bytes, &pin)?;
        let id = crypto::generate_id();

        let file = VaultFile {
            id: id.clone(),
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            uploaded_at: self.clock.now(),
            ciphertext: encrypted.ciphertext,
            preview,
            category: FileCategory::from_mime(mime_type),
        };
        let meta = EncryptionMetadata {
            file_id: id.clone(),
            salt: encrypted.salt,
            nonce: encrypted.nonce,
        };

        self.store.put_file(&file)?;
        if let Err(e) = self.store.put_metadata(&meta) {
            // A file without metadata is permanently undecryptable; roll the
            // file record back rather than leaving that orphan behind.
            if let Err(rollback) = self.store.delete_file(&id) {
                warn!("rollback of file {} after metadata failure also failed: {}", id, rollback);
            }
            return Err(e);
        }

        self.touch_session()?;
        debug!("file {} uploaded ({} bytes)", id, file.size);
        Ok(id)
    }

    /// Decrypt and return a file payload. Unlocked only.
    ///
    /// Decryption failures here never mutate lockout state; lockout tracks
    /// vault-unlock failures exclusively.
    pub fn download_file(&mut self, id: &str) -> Result<Vec<u8>> {
        let pin = self.require_unlocked()?.pin.clone();

        let file = self
            .store
            .file(id)?
            .ok_or_else(|| VaultError::NotFound(format!("file {}", id)))?;
        let meta = self.store.metadata(id)?.ok_or_else(|| {
            VaultError::Storage(format!("encryption metadata missing for file {}", id))
        })?;

        let plaintext = crypto::decrypt(&file.ciphertext, &pin, &meta.salt, &meta.nonce)?;
        self.touch_session()?;
        Ok(plaintext)
    }

    /// Remove a file and its encryption metadata. Unlocked only.
    pub fn delete_file(&mut self, id: &str) -> Result<()> {
        self.require_unlocked()?;
        self.store.delete_file_with_metadata(id)?;
        self.touch_session()
    }

    /// List stored files, newest first. Unlocked only.
    pub fn list_files(&self) -> Result<Vec<VaultFile>> {
        self.require_unlocked()?;
        self.store.list_files()
    }

    /// Deactivate sessions idle past the timeout. If the live session is
    /// among them the vault relocks.
    pub fn sweep_idle_sessions(&mut self) -> Result<usize> {
        let now = self.clock.now();
        let cutoff = Duration::minutes(SESSION_IDLE_MINUTES);
        let mut swept = 0;

        for mut session in self.store.list_sessions()? {
            if session.is_active && now - session.last_activity >= cutoff {
                session.is_active = false;
                self.store.put_session(&session)?;
                if self
                    .live
                    .as_ref()
                    .is_some_and(|live| live.session_id == session.id)
                {
                    self.live = None;
                    info!("live session {} timed out", session.id);
                }
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Export all file collections as one encrypted backup string, using
    /// the live session's PIN. Unlocked only.
    pub fn export_backup(&self) -> Result<String> {
        let pin = self.require_unlocked()?.pin.clone();

        let files = self.store.list_files()?;
        let mut metadata = Vec::with_capacity(files.len());
        for file in &files {
            let meta = self.store.metadata(&file.id)?.ok_or_else(|| {
                VaultError::Storage(format!("encryption metadata missing for file {}", file.id))
            })?;
            metadata.push(meta);
        }

        create_backup(&VaultExport { files, metadata }, &pin)
    }

    /// Restore file collections from a backup string. Unlocked only; the
    /// backup must have been created with the same PIN.
    pub fn import_backup(&mut self, blob: &str) -> Result<usize> {
        let pin = self.require_unlocked()?.pin.clone();

        let export: VaultExport = restore_from_backup(blob, &pin)?;
        for file in &export.files {
            self.store.put_file(file)?;
        }
        for meta in &export.metadata {
            self.store.put_metadata(meta)?;
        }
        info!("imported {} file(s) from backup", export.files.len());
        Ok(export.files.len())
    }

    /// Wipe everything: files, metadata, sessions and the PIN itself.
    /// Permanently forfeits access to all previously encrypted content.
    pub fn reset_vault(&mut self) -> Result<()> {
        self.live = None;
        self.store.clear_all()?;
        info!("vault reset; all collections cleared");
        Ok(())
    }

    fn require_unlocked(&self) -> Result<&LiveSession> {
        self.live.as_ref().ok_or(VaultError::Locked)
    }

    fn start_session(&mut self, pin: &str) -> Result<String> {
        let now = self.clock.now();
        let session = VaultSession {
            id: crypto::generate_id(),
            started_at: now,
            last_activity: now,
            is_active: true,
        };
        self.store.put_session(&session)?;
        let session_id = session.id.clone();
        self.live = Some(LiveSession {
            session_id: session_id.clone(),
            pin: Zeroizing::new(pin.to_string()),
        });
        Ok(session_id)
    }

    fn deactivate_session(&self, session_id: &str) -> Result<()> {
        if let Some(mut session) = self.store.session(session_id)? {
            session.is_active = false;
            session.last_activity = self.clock.now();
            self.store.put_session(&session)?;
        }
        Ok(())
    }

    fn touch_session(&self) -> Result<()> {
        if let Some(live) = &self.live {
            if let Some(mut session) = self.store.session(&live.session_id)? {
                session.last_activity = self.clock.now();
                self.store.put_session(&session)?;
            }
        }
        Ok(())
    }
}
