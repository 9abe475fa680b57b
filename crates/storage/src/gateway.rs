// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite persistence gateway.
//!
//! All mutations flow through parameterized statements; callers never build
//! SQL from untrusted input. `with_tx` gives atomic commit/rollback; store
//! helpers that compose take the open connection (`*_tx` functions) so a
//! nested call reuses the outer transaction instead of opening its own.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use sup_core::ErrorKind;
use thiserror::Error;
use tracing::debug;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("schema version {0} is newer than supported ({1})")]
    SchemaTooNew(i64, i64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Validation(_) => ErrorKind::Validation,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::Crypto(_) => ErrorKind::Internal,
            StorageError::Db(_)
            | StorageError::Json(_)
            | StorageError::SchemaTooNew(_, _)
            | StorageError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the underlying SQLite error is a unique/constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Db(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Handle to the service database.
///
/// Cheap to clone; all clones share one connection guarded by a short-lived
/// mutex. SQLite serializes writers anyway, so a single connection with WAL
/// journaling keeps the hot path simple and the lock holds brief.
#[derive(Clone)]
pub struct Gateway {
    conn: Arc<Mutex<Connection>>,
}

impl Gateway {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        crate::schema::migrate(&conn)?;
        debug!(path = %path.display(), "database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        crate::schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> Result<(), StorageError> {
        // journal_mode and busy_timeout return a result row; query it away
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        let _timeout: i64 = conn.query_row("PRAGMA busy_timeout=5000", [], |r| r.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run `f` with the open connection, outside any explicit transaction.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` atomically.
    ///
    /// If the connection is already inside a transaction (a `*_tx` helper
    /// composed us), `f` joins it; otherwise a new immediate transaction is
    /// opened and committed/rolled back around `f`.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            return f(&conn);
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

/// Map a value-level decode failure inside a row-mapping closure.
pub(crate) fn column_decode_error(
    column: usize,
    message: impl Into<String>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into().into(),
    )
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
