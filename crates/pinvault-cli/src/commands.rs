//! Command implementations.
//!
//! Every content command follows the same shape: open the store, prompt for
//! the PIN, submit it through the access controller (so failed attempts and
//! lockout are enforced), perform the operation, close the vault.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Password};
use pinvault_core::vault::VaultState;
use pinvault_core::{policy, SqliteVaultStore, Vault, VaultError};

fn open_vault(store_path: &Path) -> Result<Vault<SqliteVaultStore>> {
    let store = SqliteVaultStore::open(store_path)
        .with_context(|| format!("cannot open vault store at {}", store_path.display()))?;
    Ok(Vault::new(store))
}

/// Prompt for the PIN and unlock, translating controller errors into
/// messages a terminal user can act on.
fn unlock(vault: &mut Vault<SqliteVaultStore>) -> Result<()> {
    let pin = Password::new().with_prompt("PIN").interact()?;
    match vault.submit_pin(&pin) {
        Ok(_) => Ok(()),
        Err(VaultError::Authentication { attempts_remaining }) => {
            bail!("incorrect PIN ({} attempts remaining)", attempts_remaining)
        }
        Err(VaultError::LockedOut { seconds_remaining }) => {
            bail!(
                "vault locked out; try again in {} minute(s)",
                (seconds_remaining as u64).div_ceil(60)
            )
        }
        Err(VaultError::PinNotSet) => bail!("no PIN configured; run `pinvault setup` first"),
        Err(e) => Err(e.into()),
    }
}

pub fn setup(store_path: &Path, generate: bool) -> Result<()> {
    let mut vault = open_vault(store_path)?;

    let pin = if generate {
        let pin = policy::generate_secure_pin();
        println!("Generated PIN: {}", pin);
        println!("Store it safely. A forgotten PIN cannot be recovered.");
        pin
    } else {
        Password::new()
            .with_prompt("Choose a PIN")
            .with_confirmation("Confirm PIN", "PINs do not match")
            .interact()?
    };

    match vault.setup_pin(&pin) {
        Ok(_) => {}
        Err(VaultError::Validation(errors)) => {
            eprintln!("PIN rejected:");
            for error in &errors {
                eprintln!("  - {}", error);
            }
            bail!("PIN does not satisfy the policy");
        }
        Err(VaultError::PinAlreadySet) => {
            bail!("a PIN is already configured; use `pinvault reset` to start over")
        }
        Err(e) => return Err(e.into()),
    }

    vault.close_vault()?;
    println!("Vault created at {}", store_path.display());
    Ok(())
}

pub fn status(store_path: &Path, json: bool) -> Result<()> {
    let mut vault = open_vault(store_path)?;
    let status = vault.activate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status.state {
        VaultState::NoPin => println!("No PIN configured"),
        VaultState::Locked { attempts } => {
            println!(
                "Locked ({} failed attempts, {} remaining)",
                attempts,
                status.attempts_remaining.unwrap_or(0)
            );
        }
        VaultState::LockedOut { until } => {
            println!(
                "Locked out until {} ({} seconds remaining)",
                until.to_rfc3339(),
                status.lockout_seconds_remaining.unwrap_or(0)
            );
        }
        VaultState::Unlocked { session_id } => println!("Unlocked (session {})", session_id),
    }
    Ok(())
}

pub fn gen_pin() -> Result<()> {
    println!("{}", policy::generate_secure_pin());
    Ok(())
}

pub fn list(store_path: &Path) -> Result<()> {
    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    let files = vault.list_files()?;
    if files.is_empty() {
        println!("Vault is empty");
    } else {
        for file in &files {
            println!(
                "{}  {:>10}  {:<12}  {}  {}",
                file.id,
                file.size,
                file.category.as_str(),
                file.uploaded_at.format("%Y-%m-%d %H:%M"),
                file.name
            );
        }
    }

    vault.close_vault()?;
    Ok(())
}

pub fn add(store_path: &Path, path: &Path, name: Option<String>, mime: &str) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    });

    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    let id = vault.upload_file(&bytes, &name, mime, None)?;
    vault.close_vault()?;
    println!("{}", id);
    Ok(())
}

pub fn get(store_path: &Path, id: &str, output: Option<&Path>) -> Result<()> {
    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    let plaintext = match vault.download_file(id) {
        Ok(bytes) => bytes,
        Err(VaultError::NotFound(what)) => bail!("{}", what),
        Err(VaultError::Decryption) => {
            bail!("decryption failed: wrong PIN for this file or corrupted vault data")
        }
        Err(e) => return Err(e.into()),
    };
    vault.close_vault()?;

    match output {
        Some(path) => std::fs::write(path, &plaintext)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => std::io::stdout().write_all(&plaintext)?,
    }
    Ok(())
}

pub fn remove(store_path: &Path, id: &str) -> Result<()> {
    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    vault.delete_file(id)?;
    vault.close_vault()?;
    println!("Deleted {}", id);
    Ok(())
}

pub fn backup(store_path: &Path, output: Option<&Path>) -> Result<()> {
    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    let blob = vault.export_backup()?;
    vault.close_vault()?;

    match output {
        Some(path) => std::fs::write(path, &blob)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => println!("{}", blob),
    }
    Ok(())
}

pub fn restore(store_path: &Path, input: &Path) -> Result<()> {
    let blob = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;

    let mut vault = open_vault(store_path)?;
    unlock(&mut vault)?;

    let count = match vault.import_backup(&blob) {
        Ok(count) => count,
        Err(VaultError::BackupFormat(msg)) => bail!("not a valid backup: {}", msg),
        Err(VaultError::Decryption) => {
            bail!("cannot decrypt backup: it was created with a different PIN")
        }
        Err(e) => return Err(e.into()),
    };
    vault.close_vault()?;
    println!("Restored {} file(s)", count);
    Ok(())
}

pub fn reset(store_path: &Path, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Permanently delete the PIN and ALL vault contents?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let mut vault = open_vault(store_path)?;
    vault.reset_vault()?;
    println!("Vault reset");
    Ok(())
}
