//! File-backed access token store.
//!
//! Schema and semantics are ported from the original `access_token.py`
//! admin tool: tokens are never stored in plaintext, each entry can be
//! individually disabled without being deleted, and a lookup only succeeds
//! for an enabled entry.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use anwdl_common::constants::ACCESS_TOKEN_RAW_LEN;
use anwdl_crypto::generate_url_safe_token;

use crate::error::{AccessTokenError, Result};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A file-backed store of hashed access tokens.
pub struct AccessTokenStore {
    conn: Mutex<Connection>,
}

impl AccessTokenStore {
    /// Opens (creating if absent) the SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS access_tokens (
                entry_id   INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                token_hash TEXT NOT NULL,
                enabled    INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Generates and stores a new access token, returning its entry id,
    /// creation timestamp, and the plaintext token.
    #[allow(clippy::missing_panics_doc)]
    pub fn add_entry(&self, disabled: bool) -> Result<(i64, i64, String)> {
        let token = generate_url_safe_token(ACCESS_TOKEN_RAW_LEN);
        let created_at = Utc::now().timestamp();
        let conn = self.conn.lock().expect("access token mutex poisoned");
        conn.execute(
            "INSERT INTO access_tokens (created_at, token_hash, enabled) VALUES (?1, ?2, ?3)",
            params![created_at, sha256_hex(&token), i64::from(!disabled)],
        )?;
        let entry_id = conn.last_insert_rowid();
        tracing::info!(entry_id, "issued access token");
        Ok((entry_id, created_at, token))
    }

    /// Returns the entry id for `token`, only if it exists and is enabled.
    #[allow(clippy::missing_panics_doc)]
    pub fn entry_id_for(&self, token: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("access token mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT entry_id FROM access_tokens WHERE token_hash = ?1 AND enabled = 1",
        )?;
        let mut rows = stmt.query(params![sha256_hex(token)])?;
        Ok(match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        })
    }

    /// Enables a previously disabled entry.
    pub fn enable_entry(&self, entry_id: i64) -> Result<()> {
        self.set_enabled(entry_id, true)
    }

    /// Disables an entry without deleting it.
    pub fn disable_entry(&self, entry_id: i64) -> Result<()> {
        self.set_enabled(entry_id, false)
    }

    #[allow(clippy::missing_panics_doc)]
    fn set_enabled(&self, entry_id: i64, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().expect("access token mutex poisoned");
        let changed = conn.execute(
            "UPDATE access_tokens SET enabled = ?1 WHERE entry_id = ?2",
            params![i64::from(enabled), entry_id],
        )?;
        if changed == 0 {
            return Err(AccessTokenError::NotFound(entry_id));
        }
        Ok(())
    }

    /// Permanently removes an entry.
    #[allow(clippy::missing_panics_doc)]
    pub fn delete_entry(&self, entry_id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("access token mutex poisoned");
        let changed =
            conn.execute("DELETE FROM access_tokens WHERE entry_id = ?1", params![entry_id])?;
        if changed == 0 {
            return Err(AccessTokenError::NotFound(entry_id));
        }
        Ok(())
    }

    /// Lists every entry id, creation timestamp, and enabled flag.
    #[allow(clippy::missing_panics_doc)]
    pub fn list_entries(&self) -> Result<Vec<(i64, i64, bool)>> {
        let conn = self.conn.lock().expect("access token mutex poisoned");
        let mut stmt = conn.prepare("SELECT entry_id, created_at, enabled FROM access_tokens")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)? != 0))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_look_up_enabled_token() {
        let store = AccessTokenStore::open_in_memory().expect("open");
        let (entry_id, _, token) = store.add_entry(false).expect("add");
        assert_eq!(store.entry_id_for(&token).expect("lookup"), Some(entry_id));
    }

    #[test]
    fn disabled_token_does_not_authorize() {
        let store = AccessTokenStore::open_in_memory().expect("open");
        let (entry_id, _, token) = store.add_entry(false).expect("add");
        store.disable_entry(entry_id).expect("disable");
        assert_eq!(store.entry_id_for(&token).expect("lookup"), None);
    }

    #[test]
    fn re_enabling_restores_authorization() {
        let store = AccessTokenStore::open_in_memory().expect("open");
        let (entry_id, _, token) = store.add_entry(true).expect("add disabled");
        assert_eq!(store.entry_id_for(&token).expect("lookup"), None);
        store.enable_entry(entry_id).expect("enable");
        assert_eq!(store.entry_id_for(&token).expect("lookup"), Some(entry_id));
    }

    #[test]
    fn deleting_missing_entry_errors() {
        let store = AccessTokenStore::open_in_memory().expect("open");
        let err = store.delete_entry(999).unwrap_err();
        assert!(matches!(err, AccessTokenError::NotFound(999)));
    }

    #[test]
    fn persists_across_reopen_of_file_backed_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.sqlite3");

        let token = {
            let store = AccessTokenStore::open(&path).expect("open");
            store.add_entry(false).expect("add").2
        };

        let store = AccessTokenStore::open(&path).expect("reopen");
        assert!(store.entry_id_for(&token).expect("lookup").is_some());
    }
}
