// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encrypted secret store.
//!
//! Values are sealed with AES-256-GCM under a per-record nonce; the stored
//! blob is `nonce || ciphertext+tag`. Cleartext exists only in memory during
//! `get`. Every `get`/`set`/`delete`, success or failure, appends an
//! immutable access-log row.

use crate::gateway::{Gateway, StorageError};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sup_core::Clock;
use tracing::debug;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Optional attributes stored alongside a secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretMeta {
    pub secret_type: Option<String>,
    pub description: Option<String>,
    pub expires_at_epoch_ms: Option<u64>,
    #[serde(default)]
    pub metadata: Value,
}

/// Secret listing row. Never carries a value, encrypted or otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretInfo {
    pub key_path: String,
    pub secret_type: Option<String>,
    pub description: Option<String>,
    pub access_count: u64,
    pub last_accessed_at_epoch_ms: Option<u64>,
    pub expires_at_epoch_ms: Option<u64>,
    pub created_at_epoch_ms: u64,
    pub updated_at_epoch_ms: u64,
}

/// One access-log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretAccess {
    pub id: i64,
    pub secret_id: Option<i64>,
    pub key_path: String,
    pub accessed_by: String,
    pub access_type: String,
    pub success: bool,
    pub error: Option<String>,
    pub accessed_at_epoch_ms: u64,
}

/// Encrypted secret store keyed by hierarchical `segment/segment/…` paths.
#[derive(Clone)]
pub struct SecretStore<C: Clock> {
    gateway: Gateway,
    cipher: Aes256Gcm,
    key_id: String,
    clock: C,
}

impl<C: Clock> SecretStore<C> {
    pub fn new(gateway: Gateway, key: &[u8; 32], key_id: impl Into<String>, clock: C) -> Self {
        Self {
            gateway,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            key_id: key_id.into(),
            clock,
        }
    }

    /// Store (or replace) a secret value.
    pub fn set(
        &self,
        key_path: &str,
        value: &str,
        accessed_by: &str,
        meta: SecretMeta,
    ) -> Result<(), StorageError> {
        let result = self.set_inner(key_path, value, meta);
        self.log_access(key_path, accessed_by, "set", &result)?;
        result
    }

    /// Decrypt a secret value in memory.
    pub fn get(&self, key_path: &str, accessed_by: &str) -> Result<String, StorageError> {
        let result = self.get_inner(key_path);
        self.log_access(key_path, accessed_by, "get", &result)?;
        result
    }

    /// Delete a secret. Returns whether a row existed.
    pub fn delete(&self, key_path: &str, accessed_by: &str) -> Result<bool, StorageError> {
        let result = self.delete_inner(key_path);
        self.log_access(key_path, accessed_by, "delete", &result)?;
        result
    }

    /// List secret metadata under an optional path prefix. Not an access:
    /// values are untouched, so nothing is logged.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<SecretInfo>, StorageError> {
        self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key_path, secret_type, description, access_count, last_accessed_at,
                        expires_at, created_at, updated_at
                 FROM secrets
                 WHERE ?1 IS NULL OR key_path LIKE ?1 || '%'
                 ORDER BY key_path ASC",
            )?;
            let rows = stmt.query_map(params![prefix], |row| {
                Ok(SecretInfo {
                    key_path: row.get(0)?,
                    secret_type: row.get(1)?,
                    description: row.get(2)?,
                    access_count: row.get::<_, i64>(3)? as u64,
                    last_accessed_at_epoch_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                    expires_at_epoch_ms: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
                    created_at_epoch_ms: row.get::<_, i64>(6)? as u64,
                    updated_at_epoch_ms: row.get::<_, i64>(7)? as u64,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Access-log rows, newest first, optionally filtered by key path.
    pub fn access_log(&self, key_path: Option<&str>) -> Result<Vec<SecretAccess>, StorageError> {
        self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, secret_id, key_path, accessed_by, access_type, success, error,
                        accessed_at
                 FROM secret_access_log
                 WHERE ?1 IS NULL OR key_path = ?1
                 ORDER BY id DESC",
            )?;
            let rows = stmt.query_map(params![key_path], |row| {
                Ok(SecretAccess {
                    id: row.get(0)?,
                    secret_id: row.get(1)?,
                    key_path: row.get(2)?,
                    accessed_by: row.get(3)?,
                    access_type: row.get(4)?,
                    success: row.get(5)?,
                    error: row.get(6)?,
                    accessed_at_epoch_ms: row.get::<_, i64>(7)? as u64,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    fn set_inner(&self, key_path: &str, value: &str, meta: SecretMeta) -> Result<(), StorageError> {
        validate_key_path(key_path)?;
        let now = self.clock.epoch_ms();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);

        self.gateway.with_conn(|conn| {
            conn.execute(
                "INSERT INTO secrets
                   (key_path, encrypted_value, encryption_key_id, secret_type, description,
                    expires_at, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT (key_path) DO UPDATE SET
                   encrypted_value = excluded.encrypted_value,
                   encryption_key_id = excluded.encryption_key_id,
                   secret_type = excluded.secret_type,
                   description = excluded.description,
                   expires_at = excluded.expires_at,
                   metadata = excluded.metadata,
                   updated_at = excluded.updated_at",
                params![
                    key_path,
                    blob,
                    self.key_id,
                    meta.secret_type,
                    meta.description,
                    meta.expires_at_epoch_ms.map(|v| v as i64),
                    serde_json::to_string(&meta.metadata)?,
                    now as i64,
                ],
            )?;
            Ok(())
        })?;
        debug!(key_path, "secret stored");
        Ok(())
    }

    fn get_inner(&self, key_path: &str) -> Result<String, StorageError> {
        validate_key_path(key_path)?;
        let now = self.clock.epoch_ms();
        let row: Option<(i64, Vec<u8>, Option<i64>)> = self.gateway.with_conn(|conn| {
            conn.query_row(
                "SELECT id, encrypted_value, expires_at FROM secrets WHERE key_path = ?1",
                params![key_path],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .map_err(StorageError::from)
        })?;
        let (id, blob, expires_at) =
            row.ok_or_else(|| StorageError::NotFound(format!("secret {key_path}")))?;
        if let Some(expiry) = expires_at {
            if (expiry as u64) <= now {
                return Err(StorageError::NotFound(format!("secret {key_path} expired")));
            }
        }
        if blob.len() <= NONCE_LEN {
            return Err(StorageError::Crypto(format!(
                "secret {key_path} blob too short"
            )));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Crypto(format!("decryption failed for {key_path}")))?;
        let value = String::from_utf8(plaintext)
            .map_err(|_| StorageError::Crypto(format!("secret {key_path} is not utf-8")))?;

        self.gateway.with_conn(|conn| {
            conn.execute(
                "UPDATE secrets SET access_count = access_count + 1, last_accessed_at = ?2
                 WHERE id = ?1",
                params![id, now as i64],
            )?;
            Ok(())
        })?;
        Ok(value)
    }

    fn delete_inner(&self, key_path: &str) -> Result<bool, StorageError> {
        validate_key_path(key_path)?;
        self.gateway.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM secrets WHERE key_path = ?1",
                params![key_path],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Append an access-log row mirroring `result`.
    fn log_access<T>(
        &self,
        key_path: &str,
        accessed_by: &str,
        access_type: &str,
        result: &Result<T, StorageError>,
    ) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let (success, error) = match result {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        self.gateway.with_conn(|conn| {
            let secret_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM secrets WHERE key_path = ?1",
                    params![key_path],
                    |r| r.get(0),
                )
                .optional()?;
            conn.execute(
                "INSERT INTO secret_access_log
                   (secret_id, key_path, accessed_by, access_type, success, error, accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    secret_id,
                    key_path,
                    accessed_by,
                    access_type,
                    success,
                    error,
                    now as i64,
                ],
            )?;
            Ok(())
        })
    }
}

/// Validate a hierarchical key path: non-empty `/`-separated segments of
/// `[A-Za-z0-9_-]`.
fn validate_key_path(key_path: &str) -> Result<(), StorageError> {
    if key_path.is_empty() || key_path.starts_with('/') || key_path.ends_with('/') {
        return Err(StorageError::Validation(format!(
            "invalid secret key path: {key_path:?}"
        )));
    }
    for segment in key_path.split('/') {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StorageError::Validation(format!(
                "invalid secret key path segment: {segment:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
