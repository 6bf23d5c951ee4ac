//! Explicit, mutex-guarded registry of per-session client credentials.
//!
//! The original implementation kept these rows in an in-memory SQLite table.
//! Here the registry is a plain `HashMap` behind a single mutex with a
//! narrow method API — no row is ever addressed by anything but this store's
//! own methods, and no caller ever sees the raw token or UUID once stored.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use anwdl_common::constants::SESSION_TOKEN_RAW_LEN;
use anwdl_crypto::generate_url_safe_token;

use crate::error::{CredentialError, Result};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone)]
struct CredentialRow {
    created_at: DateTime<Utc>,
    container_uuid_hash: String,
    client_token_hash: String,
}

#[derive(Default)]
struct Inner {
    rows: HashMap<u64, CredentialRow>,
    next_id: u64,
}

/// In-memory registry mapping container UUIDs to hashed client tokens.
pub struct CredentialStore {
    inner: Mutex<Inner>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Registers a freshly-provisioned container, generating its client
    /// token. Returns the entry id, creation timestamp, and the plaintext
    /// token (the only time it is ever visible — only its hash is retained).
    #[allow(clippy::missing_panics_doc)]
    pub fn add_entry(&self, container_uuid: Uuid) -> Result<(u64, DateTime<Utc>, String)> {
        let mut inner = self.inner.lock().expect("credential store mutex poisoned");
        let uuid_hash = sha256_hex(&container_uuid.to_string());
        if inner.rows.values().any(|r| r.container_uuid_hash == uuid_hash) {
            return Err(CredentialError::DuplicateContainer(container_uuid));
        }

        let token = generate_url_safe_token(SESSION_TOKEN_RAW_LEN);
        let entry_id = inner.next_id;
        inner.next_id += 1;
        let created_at = Utc::now();
        inner.rows.insert(
            entry_id,
            CredentialRow {
                created_at,
                container_uuid_hash: uuid_hash,
                client_token_hash: sha256_hex(&token),
            },
        );
        tracing::info!(entry_id, %container_uuid, "registered session credential");
        Ok((entry_id, created_at, token))
    }

    /// Looks up the entry id for a `(container_uuid, token)` pair, verifying
    /// both hashes match the same row.
    #[allow(clippy::missing_panics_doc)]
    pub fn entry_id_for(&self, container_uuid: Uuid, token: &str) -> Option<u64> {
        let inner = self.inner.lock().expect("credential store mutex poisoned");
        let uuid_hash = sha256_hex(&container_uuid.to_string());
        let token_hash = sha256_hex(token);
        inner
            .rows
            .iter()
            .find(|(_, row)| row.container_uuid_hash == uuid_hash && row.client_token_hash == token_hash)
            .map(|(id, _)| *id)
    }

    /// Looks up the entry id registered for a container UUID, regardless of token.
    #[allow(clippy::missing_panics_doc)]
    pub fn container_entry_id(&self, container_uuid: Uuid) -> Option<u64> {
        let inner = self.inner.lock().expect("credential store mutex poisoned");
        let uuid_hash = sha256_hex(&container_uuid.to_string());
        inner
            .rows
            .iter()
            .find(|(_, row)| row.container_uuid_hash == uuid_hash)
            .map(|(id, _)| *id)
    }

    /// Removes an entry, returning whether it existed.
    #[allow(clippy::missing_panics_doc)]
    pub fn delete_entry(&self, entry_id: u64) -> bool {
        let mut inner = self.inner.lock().expect("credential store mutex poisoned");
        inner.rows.remove(&entry_id).is_some()
    }

    /// Lists every entry id and its creation timestamp.
    #[allow(clippy::missing_panics_doc)]
    pub fn list_entries(&self) -> Vec<(u64, DateTime<Utc>)> {
        let inner = self.inner.lock().expect("credential store mutex poisoned");
        inner
            .rows
            .iter()
            .map(|(id, row)| (*id, row.created_at))
            .collect()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_entry_then_look_up_by_token() {
        let store = CredentialStore::new();
        let uuid = Uuid::new_v4();
        let (entry_id, _, token) = store.add_entry(uuid).expect("add");

        assert_eq!(store.entry_id_for(uuid, &token), Some(entry_id));
        assert_eq!(store.container_entry_id(uuid), Some(entry_id));
    }

    #[test]
    fn wrong_token_does_not_match() {
        let store = CredentialStore::new();
        let uuid = Uuid::new_v4();
        store.add_entry(uuid).expect("add");
        assert_eq!(store.entry_id_for(uuid, "wrong-token"), None);
    }

    #[test]
    fn duplicate_container_is_rejected() {
        let store = CredentialStore::new();
        let uuid = Uuid::new_v4();
        store.add_entry(uuid).expect("first add");
        let err = store.add_entry(uuid).unwrap_err();
        assert!(matches!(err, CredentialError::DuplicateContainer(_)));
    }

    #[test]
    fn delete_entry_removes_row() {
        let store = CredentialStore::new();
        let uuid = Uuid::new_v4();
        let (entry_id, ..) = store.add_entry(uuid).expect("add");
        assert!(store.delete_entry(entry_id));
        assert_eq!(store.container_entry_id(uuid), None);
        assert!(!store.delete_entry(entry_id));
    }
}
