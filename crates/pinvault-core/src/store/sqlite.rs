//! SQLite vault store backend.
//!
//! Four tables, one per collection, plus a small `meta` table recording the
//! on-disk format version. The database itself is not wholesale-encrypted:
//! file payloads arrive already encrypted and the remaining columns are the
//! deliberately-unencrypted metadata of the data model.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::store::traits::VaultStore;
use crate::store::types::{
    EncryptionMetadata, FileCategory, PinConfig, VaultFile, VaultSession,
};

/// On-disk format version written to the `meta` table.
const FORMAT_VERSION: &str = "1";

/// SQLite-backed vault store.
pub struct SqliteVaultStore {
    conn: Mutex<Connection>,
}

impl SqliteVaultStore {
    /// Open (creating if necessary) a vault store at `path`.
    ///
    /// A failure here means the persistent store is unavailable and the
    /// vault subsystem cannot start.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    VaultError::Initialization(format!(
                        "cannot create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            VaultError::Initialization(format!("cannot open store at {}: {}", path.display(), e))
        })?;
        let store = Self::from_connection(conn)?;
        debug!("opened vault store at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and by callers that want a
    /// throwaway vault.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VaultError::Initialization(format!("cannot open in-memory store: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pin_config (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                hash TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                lockout_until TEXT,
                is_first_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                ciphertext BLOB NOT NULL,
                preview BLOB,
                category TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS encryption_metadata (
                key TEXT PRIMARY KEY,
                file_id TEXT NOT NULL,
                salt BLOB NOT NULL,
                nonce BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                last_activity TEXT NOT NULL,
                is_active INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| VaultError::Initialization(format!("cannot create schema: {}", e)))?;

        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?1)",
            [FORMAT_VERSION],
        )
        .map_err(|e| VaultError::Initialization(format!("cannot write metadata: {}", e)))?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('created_at', ?1)",
            [Utc::now().to_rfc3339()],
        )
        .map_err(|e| VaultError::Initialization(format!("cannot write metadata: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::Storage("SQLite connection poisoned".to_string()))
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| VaultError::Storage(format!("invalid timestamp: {}", e)))
    }

    fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFileRow> {
        Ok(RawFileRow {
            id: row.get(0)?,
            name: row.get(1)?,
            size: row.get(2)?,
            mime_type: row.get(3)?,
            uploaded_at: row.get(4)?,
            ciphertext: row.get(5)?,
            preview: row.get(6)?,
            category: row.get(7)?,
        })
    }
}

struct RawFileRow {
    id: String,
    name: String,
    size: i64,
    mime_type: String,
    uploaded_at: String,
    ciphertext: Vec<u8>,
    preview: Option<Vec<u8>>,
    category: String,
}

impl RawFileRow {
    fn into_file(self) -> Result<VaultFile> {
        Ok(VaultFile {
            id: self.id,
            name: self.name,
            size: self.size as u64,
            mime_type: self.mime_type,
            uploaded_at: SqliteVaultStore::parse_timestamp(&self.uploaded_at)?,
            ciphertext: self.ciphertext,
            preview: self.preview,
            category: FileCategory::parse(&self.category),
        })
    }
}

impl VaultStore for SqliteVaultStore {
    fn pin_config(&self) -> Result<Option<PinConfig>> {
        let conn = self.conn()?;
        let row: Option<(String, i64, Option<String>, bool)> = conn
            .query_row(
                "SELECT hash, attempts, lockout_until, is_first_time FROM pin_config WHERE id = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((hash, attempts, lockout_until, is_first_time)) => {
                let lockout_until = lockout_until
                    .as_deref()
                    .map(Self::parse_timestamp)
                    .transpose()?;
                Ok(Some(PinConfig {
                    hash,
                    attempts: attempts as u32,
                    lockout_until,
                    is_first_time,
                }))
            }
        }
    }

    fn put_pin_config(&self, config: &PinConfig) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pin_config (id, hash, attempts, lockout_until, is_first_time)
             VALUES (0, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               hash = ?1, attempts = ?2, lockout_until = ?3, is_first_time = ?4",
            params![
                config.hash,
                config.attempts,
                config.lockout_until.map(|t| t.to_rfc3339()),
                config.is_first_time,
            ],
        )?;
        Ok(())
    }

    fn delete_pin_config(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM pin_config WHERE id = 0", [])?;
        Ok(())
    }

    fn put_file(&self, file: &VaultFile) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO files (id, name, size, mime_type, uploaded_at, ciphertext, preview, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
               name = ?2, size = ?3, mime_type = ?4, uploaded_at = ?5,
               ciphertext = ?6, preview = ?7, category = ?8",
            params![
                file.id,
                file.name,
                file.size as i64,
                file.mime_type,
                file.uploaded_at.to_rfc3339(),
                file.ciphertext,
                file.preview,
                file.category.as_str(),
            ],
        )?;
        Ok(())
    }

    fn file(&self, id: &str) -> Result<Option<VaultFile>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, size, mime_type, uploaded_at, ciphertext, preview, category
                 FROM files WHERE id = ?1",
                [id],
                Self::file_from_row,
            )
            .optional()?;
        drop(conn);
        row.map(RawFileRow::into_file).transpose()
    }

    fn list_files(&self) -> Result<Vec<VaultFile>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, name, size, mime_type, uploaded_at, ciphertext, preview, category
             FROM files ORDER BY uploaded_at DESC",
        )?;
        let rows = statement.query_map([], Self::file_from_row)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?.into_file()?);
        }
        Ok(files)
    }

    fn delete_file(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(VaultError::NotFound(format!("file {}", id)));
        }
        Ok(())
    }

    fn put_metadata(&self, meta: &EncryptionMetadata) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO encryption_metadata (key, file_id, salt, nonce)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET file_id = ?2, salt = ?3, nonce = ?4",
            params![
                EncryptionMetadata::storage_key(&meta.file_id),
                meta.file_id,
                meta.salt.as_slice(),
                meta.nonce.as_slice(),
            ],
        )?;
        Ok(())
    }

    fn metadata(&self, file_id: &str) -> Result<Option<EncryptionMetadata>> {
        let conn = self.conn()?;
        let row: Option<(String, Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT file_id, salt, nonce FROM encryption_metadata WHERE key = ?1",
                [EncryptionMetadata::storage_key(file_id)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((file_id, salt, nonce)) => Ok(Some(EncryptionMetadata {
                file_id,
                salt: salt
                    .try_into()
                    .map_err(|_| VaultError::Storage("corrupt salt length".to_string()))?,
                nonce: nonce
                    .try_into()
                    .map_err(|_| VaultError::Storage("corrupt nonce length".to_string()))?,
            })),
        }
    }

    fn put_session(&self, session: &VaultSession) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (id, started_at, last_activity, is_active)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               started_at = ?2, last_activity = ?3, is_active = ?4",
            params![
                session.id,
                session.started_at.to_rfc3339(),
                session.last_activity.to_rfc3339(),
                session.is_active,
            ],
        )?;
        Ok(())
    }

    fn session(&self, id: &str) -> Result<Option<VaultSession>> {
        let conn = self.conn()?;
        let row: Option<(String, String, String, bool)> = conn
            .query_row(
                "SELECT id, started_at, last_activity, is_active FROM sessions WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, started_at, last_activity, is_active)) => Ok(Some(VaultSession {
                id,
                started_at: Self::parse_timestamp(&started_at)?,
                last_activity: Self::parse_timestamp(&last_activity)?,
                is_active,
            })),
        }
    }

    fn list_sessions(&self) -> Result<Vec<VaultSession>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, started_at, last_activity, is_active
             FROM sessions ORDER BY started_at DESC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, last_activity, is_active) = row?;
            sessions.push(VaultSession {
                id,
                started_at: Self::parse_timestamp(&started_at)?,
                last_activity: Self::parse_timestamp(&last_activity)?,
                is_active,
            });
        }
        Ok(sessions)
    }

    fn delete_file_with_metadata(&self, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let changed = tx
            .execute("DELETE FROM files WHERE id = ?1", [id])
            .map_err(|e| VaultError::Storage(format!("failed to delete file {}: {}", id, e)))?;
        if changed == 0 {
            return Err(VaultError::NotFound(format!("file {}", id)));
        }

        tx.execute(
            "DELETE FROM encryption_metadata WHERE key = ?1",
            [EncryptionMetadata::storage_key(id)],
        )
        .map_err(|e| {
            VaultError::Storage(format!(
                "failed to delete encryption metadata for file {}: {}",
                id, e
            ))
        })?;

        tx.commit()
            .map_err(|e| VaultError::Storage(format!("failed to commit delete of {}: {}", id, e)))?;
        debug!("deleted file {} and its metadata", id);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let conn = self.conn()?;
        // Cleared one collection at a time so a failure can be attributed.
        for table in ["files", "encryption_metadata", "sessions", "pin_config"] {
            conn.execute(&format!("DELETE FROM {}", table), [])
                .map_err(|e| VaultError::Storage(format!("failed to clear {}: {}", table, e)))?;
        }
        Ok(())
    }
}
