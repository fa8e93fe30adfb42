//! End-to-end tests for the access controller state machine.
//!
//! Time-dependent behaviour (lockout expiry, idle sweeps) runs on a manual
//! clock so the 15-minute window can be crossed instantly.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use pinvault_core::vault::{Clock, Vault, VaultState, MAX_ATTEMPTS};
use pinvault_core::{SqliteVaultStore, VaultError};

#[derive(Clone)]
struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Utc::now())))
    }

    fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().expect("clock lock");
        *now += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

fn fresh_vault() -> (Vault<SqliteVaultStore>, ManualClock) {
    let clock = ManualClock::new();
    let store = SqliteVaultStore::open_in_memory().expect("in-memory store");
    let vault = Vault::with_clock(store, Box::new(clock.clone()));
    (vault, clock)
}

fn expect_auth_failure(vault: &mut Vault<SqliteVaultStore>, pin: &str) -> u32 {
    match vault.submit_pin(pin) {
        Err(VaultError::Authentication { attempts_remaining }) => attempts_remaining,
        other => panic!("expected Authentication error, got {:?}", other.map(|s| s.state)),
    }
}

#[test]
fn test_fresh_vault_has_no_pin() {
    let (mut vault, _clock) = fresh_vault();
    let status = vault.activate().unwrap();
    assert_eq!(status.state, VaultState::NoPin);

    assert!(matches!(
        vault.submit_pin("4821"),
        Err(VaultError::PinNotSet)
    ));
}

#[test]
fn test_setup_rejects_weak_pin_with_all_errors() {
    let (mut vault, _clock) = fresh_vault();
    match vault.setup_pin("1a") {
        Err(VaultError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected Validation error, got {:?}", other.map(|s| s.state)),
    }

    assert!(matches!(
        vault.setup_pin("1234"),
        Err(VaultError::Validation(_))
    ));
    // Nothing persisted by the failed setups
    assert_eq!(vault.status().unwrap().state, VaultState::NoPin);
}

#[test]
fn test_setup_unlocks_and_close_relocks() {
    let (mut vault, _clock) = fresh_vault();

    let status = vault.setup_pin("4821").unwrap();
    assert!(matches!(status.state, VaultState::Unlocked { .. }));

    let status = vault.close_vault().unwrap();
    assert_eq!(status.state, VaultState::Locked { attempts: 0 });
    assert_eq!(status.attempts_remaining, Some(MAX_ATTEMPTS));

    assert!(matches!(
        vault.setup_pin("4821"),
        Err(VaultError::PinAlreadySet)
    ));
}

#[test]
fn test_failed_attempts_count_down_then_lock_out() {
    let (mut vault, _clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    vault.close_vault().unwrap();

    for expected_remaining in [4, 3, 2, 1] {
        let remaining = expect_auth_failure(&mut vault, "0000");
        assert_eq!(remaining, expected_remaining);
    }
    let status = vault.status().unwrap();
    assert_eq!(status.state, VaultState::Locked { attempts: 4 });

    // Fifth wrong submission trips the lockout
    let remaining = expect_auth_failure(&mut vault, "0000");
    assert_eq!(remaining, 0);

    let status = vault.status().unwrap();
    assert!(matches!(status.state, VaultState::LockedOut { .. }));
    let seconds = status.lockout_seconds_remaining.unwrap();
    assert!(seconds > 890 && seconds <= 900, "got {} seconds", seconds);
}

#[test]
fn test_no_pin_is_checked_during_lockout() {
    let (mut vault, clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    vault.close_vault().unwrap();
    for _ in 0..5 {
        let _ = vault.submit_pin("0000");
    }

    // Even the correct PIN is rejected while locked out
    assert!(matches!(
        vault.submit_pin("4821"),
        Err(VaultError::LockedOut { .. })
    ));

    clock.advance_secs(14 * 60);
    match vault.submit_pin("4821") {
        Err(VaultError::LockedOut { seconds_remaining }) => {
            assert!(seconds_remaining <= 60, "got {}", seconds_remaining);
        }
        other => panic!("expected LockedOut, got {:?}", other.map(|s| s.state)),
    }

    // Attempt count untouched by lockout-window submissions
    clock.advance_secs(2 * 60);
    let status = vault.status().unwrap();
    assert_eq!(status.state, VaultState::Locked { attempts: 5 });
}

#[test]
fn test_correct_pin_after_lockout_expiry_resets_attempts() {
    let (mut vault, clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    vault.close_vault().unwrap();
    for _ in 0..5 {
        let _ = vault.submit_pin("0000");
    }

    clock.advance_secs(15 * 60 + 1);
    let status = vault.submit_pin("4821").unwrap();
    assert!(matches!(status.state, VaultState::Unlocked { .. }));

    let status = vault.close_vault().unwrap();
    assert_eq!(status.state, VaultState::Locked { attempts: 0 });
}

#[test]
fn test_wrong_pin_after_lockout_expiry_relocks_immediately() {
    // The countdown resets the ability to try, not the failure count: the
    // stored attempts are still 5, so one more failure re-enters lockout.
    let (mut vault, clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    vault.close_vault().unwrap();
    for _ in 0..5 {
        let _ = vault.submit_pin("0000");
    }

    clock.advance_secs(15 * 60 + 1);
    let remaining = expect_auth_failure(&mut vault, "0000");
    assert_eq!(remaining, 0);
    assert!(matches!(
        vault.status().unwrap().state,
        VaultState::LockedOut { .. }
    ));
}

#[test]
fn test_file_operations_require_unlock() {
    let (mut vault, _clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    vault.close_vault().unwrap();

    assert!(matches!(
        vault.upload_file(b"data", "a.txt", "text/plain", None),
        Err(VaultError::Locked)
    ));
    assert!(matches!(
        vault.download_file("deadbeef"),
        Err(VaultError::Locked)
    ));
    assert!(matches!(vault.delete_file("deadbeef"), Err(VaultError::Locked)));
    assert!(matches!(vault.list_files(), Err(VaultError::Locked)));
    assert!(matches!(vault.export_backup(), Err(VaultError::Locked)));
}

#[test]
fn test_upload_download_delete_round_trip() {
    let (mut vault, _clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();

    let payload = b"the hidden document".to_vec();
    let id = vault
        .upload_file(&payload, "doc.pdf", "application/pdf", None)
        .unwrap();
    assert_eq!(id.len(), 32);

    let files = vault.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "doc.pdf");
    assert_eq!(files[0].size, payload.len() as u64);
    // Stored payload is ciphertext, not the plaintext
    assert_ne!(files[0].ciphertext, payload);

    assert_eq!(vault.download_file(&id).unwrap(), payload);

    vault.delete_file(&id).unwrap();
    assert!(matches!(
        vault.download_file(&id),
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        vault.delete_file(&id),
        Err(VaultError::NotFound(_))
    ));
    assert!(vault.list_files().unwrap().is_empty());
}

#[test]
fn test_per_file_decryption_failure_does_not_touch_lockout() {
    let (mut vault, _clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();
    assert!(matches!(
        vault.download_file("0123456789abcdef0123456789abcdef"),
        Err(VaultError::NotFound(_))
    ));
    // Still unlocked, no attempts recorded
    assert!(matches!(
        vault.status().unwrap().state,
        VaultState::Unlocked { .. }
    ));
}

#[test]
fn test_idle_session_sweep_relocks() {
    let (mut vault, clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();

    clock.advance_secs(6 * 60);
    let swept = vault.sweep_idle_sessions().unwrap();
    assert_eq!(swept, 1);
    assert!(matches!(
        vault.status().unwrap().state,
        VaultState::Locked { .. }
    ));
}

#[test]
fn test_activity_defers_idle_sweep() {
    let (mut vault, clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();

    clock.advance_secs(4 * 60);
    vault
        .upload_file(b"x", "x.bin", "application/octet-stream", None)
        .unwrap();

    // 4 more minutes: under the timeout relative to the upload
    clock.advance_secs(4 * 60);
    assert_eq!(vault.sweep_idle_sessions().unwrap(), 0);
    assert!(matches!(
        vault.status().unwrap().state,
        VaultState::Unlocked { .. }
    ));
}

#[test]
fn test_backup_round_trip_restores_files() {
    let (mut vault, _clock) = fresh_vault();
    vault.setup_pin("4821").unwrap();

    let id_a = vault
        .upload_file(b"first", "a.txt", "text/plain", None)
        .unwrap();
    let id_b = vault
        .upload_file(b"second", "b.png", "image/png", Some(vec![1, 2, 3]))
        .unwrap();

    let backup = vault.export_backup().unwrap();

    // Wipe everything, set the same PIN back up, import
    vault.reset_vault().unwrap();
    assert_eq!(vault.status().unwrap().state, VaultState::NoPin);
    vault.setup_pin("4821").unwrap();

    let restored = vault.import_backup(&backup).unwrap();
    assert_eq!(restored, 2);
    assert_eq!(vault.download_file(&id_a).unwrap(), b"first");
    assert_eq!(vault.download_file(&id_b).unwrap(), b"second");
}

#[test]
fn test_lockout_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let clock = ManualClock::new();

    {
        let store = SqliteVaultStore::open(&path).unwrap();
        let mut vault = Vault::with_clock(store, Box::new(clock.clone()));
        vault.setup_pin("4821").unwrap();
        vault.close_vault().unwrap();
        for _ in 0..5 {
            let _ = vault.submit_pin("0000");
        }
    }

    // New process: lockout is recomputed from the persisted timestamp
    let store = SqliteVaultStore::open(&path).unwrap();
    let mut vault = Vault::with_clock(store, Box::new(clock.clone()));
    assert!(matches!(
        vault.status().unwrap().state,
        VaultState::LockedOut { .. }
    ));
    assert!(matches!(
        vault.submit_pin("4821"),
        Err(VaultError::LockedOut { .. })
    ));

    clock.advance_secs(15 * 60 + 1);
    let status = vault.submit_pin("4821").unwrap();
    assert!(matches!(status.state, VaultState::Unlocked { .. }));
}

#[test]
fn test_sessions_form_an_audit_trail() {
    use pinvault_core::VaultStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");

    {
        let store = SqliteVaultStore::open(&path).unwrap();
        let mut vault = Vault::new(store);
        vault.setup_pin("4821").unwrap();
        vault.close_vault().unwrap();
        vault.submit_pin("4821").unwrap();
        vault.close_vault().unwrap();
    }

    let store = SqliteVaultStore::open(&path).unwrap();
    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| !s.is_active));
}
