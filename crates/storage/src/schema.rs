// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! Forward-only: each step upgrades `PRAGMA user_version` by one. Opening a
//! database written by a newer build fails instead of guessing.

use crate::gateway::StorageError;
use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS instances (
    instance_id     TEXT PRIMARY KEY,
    project         TEXT NOT NULL,
    instance_type   TEXT NOT NULL,
    status          TEXT NOT NULL,
    context_percent INTEGER NOT NULL DEFAULT 0,
    current_epic    TEXT,
    host_machine    TEXT,
    created_at      INTEGER NOT NULL,
    last_heartbeat  INTEGER NOT NULL,
    closed_at       INTEGER
);
CREATE INDEX IF NOT EXISTS idx_instances_project
    ON instances(project, last_heartbeat DESC);

CREATE TABLE IF NOT EXISTS events (
    event_id     TEXT PRIMARY KEY,
    instance_id  TEXT NOT NULL REFERENCES instances(instance_id) ON DELETE CASCADE,
    sequence_num INTEGER NOT NULL,
    event_type   TEXT NOT NULL,
    event_data   TEXT NOT NULL DEFAULT '{}',
    metadata     TEXT NOT NULL DEFAULT '{}',
    timestamp    INTEGER NOT NULL,
    created_at   INTEGER NOT NULL,
    UNIQUE (instance_id, sequence_num)
);

CREATE TABLE IF NOT EXISTS command_log (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_id       TEXT REFERENCES instances(instance_id) ON DELETE CASCADE,
    command_type      TEXT NOT NULL,
    action            TEXT NOT NULL,
    tool_name         TEXT,
    parameters        TEXT NOT NULL DEFAULT '{}',
    result            TEXT,
    success           INTEGER NOT NULL,
    error_message     TEXT,
    execution_time_ms INTEGER,
    tags              TEXT NOT NULL DEFAULT '[]',
    created_at        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id          TEXT PRIMARY KEY,
    instance_id            TEXT NOT NULL REFERENCES instances(instance_id) ON DELETE CASCADE,
    sequence_num           INTEGER NOT NULL,
    checkpoint_type        TEXT NOT NULL,
    context_window_percent INTEGER NOT NULL,
    work_state             TEXT NOT NULL DEFAULT '{}',
    created_at             INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS active_spawns (
    agent_id     TEXT PRIMARY KEY,
    instance_id  TEXT,
    project_path TEXT NOT NULL,
    task_type    TEXT NOT NULL,
    description  TEXT NOT NULL,
    service      TEXT NOT NULL,
    model        TEXT NOT NULL,
    status       TEXT NOT NULL,
    output_path  TEXT NOT NULL,
    exit_code    INTEGER,
    error        TEXT,
    started_at   INTEGER NOT NULL,
    ended_at     INTEGER
);
CREATE INDEX IF NOT EXISTS idx_active_spawns_status
    ON active_spawns(status, started_at);

CREATE TABLE IF NOT EXISTS secrets (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    key_path          TEXT NOT NULL UNIQUE,
    encrypted_value   BLOB NOT NULL,
    encryption_key_id TEXT NOT NULL,
    secret_type       TEXT,
    description       TEXT,
    access_count      INTEGER NOT NULL DEFAULT 0,
    last_accessed_at  INTEGER,
    expires_at        INTEGER,
    metadata          TEXT NOT NULL DEFAULT '{}',
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS secret_access_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    secret_id   INTEGER,
    key_path    TEXT NOT NULL,
    accessed_by TEXT NOT NULL,
    access_type TEXT NOT NULL,
    success     INTEGER NOT NULL,
    error       TEXT,
    accessed_at INTEGER NOT NULL
);
"#;

/// Bring the database at `conn` up to [`SCHEMA_VERSION`].
pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StorageError::SchemaTooNew(version, SCHEMA_VERSION));
    }
    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
