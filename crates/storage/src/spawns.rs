// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ActiveSpawns table: one row per launched subagent, kept for stall
//! detection and post-mortems. Spawns reference their owning instance by id
//! but are not cascade-deleted; they can outlive the session.

use crate::gateway::{column_decode_error, Gateway, StorageError};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use sup_core::{AgentId, Clock, InstanceId, Service, TaskType};
use tracing::info;

/// Lifecycle of a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    Running,
    Completed,
    Failed,
    /// Deadline expired; the adapter process was terminated
    Stalled,
    /// Found running past its deadline by a health sweep (e.g. after restart)
    Abandoned,
}

impl SpawnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpawnStatus::Running => "running",
            SpawnStatus::Completed => "completed",
            SpawnStatus::Failed => "failed",
            SpawnStatus::Stalled => "stalled",
            SpawnStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SpawnStatus::Running),
            "completed" => Some(SpawnStatus::Completed),
            "failed" => Some(SpawnStatus::Failed),
            "stalled" => Some(SpawnStatus::Stalled),
            "abandoned" => Some(SpawnStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpawnStatus::Running)
    }
}

/// One launched subagent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub agent_id: AgentId,
    pub instance_id: Option<InstanceId>,
    pub project_path: PathBuf,
    pub task_type: TaskType,
    pub description: String,
    pub service: Service,
    pub model: String,
    pub status: SpawnStatus,
    pub output_path: PathBuf,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub started_at_epoch_ms: u64,
    pub ended_at_epoch_ms: Option<u64>,
}

/// Store for active and historical spawns.
#[derive(Clone)]
pub struct SpawnStore<C: Clock> {
    gateway: Gateway,
    clock: C,
}

impl<C: Clock> SpawnStore<C> {
    pub fn new(gateway: Gateway, clock: C) -> Self {
        Self { gateway, clock }
    }

    pub fn insert(&self, record: &SpawnRecord) -> Result<(), StorageError> {
        self.gateway.with_conn(|conn| {
            conn.execute(
                "INSERT INTO active_spawns
                   (agent_id, instance_id, project_path, task_type, description, service,
                    model, status, output_path, exit_code, error, started_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.agent_id.as_str(),
                    record.instance_id.as_ref().map(|i| i.as_str()),
                    record.project_path.display().to_string(),
                    record.task_type.as_str(),
                    record.description,
                    record.service.as_str(),
                    record.model,
                    record.status.as_str(),
                    record.output_path.display().to_string(),
                    record.exit_code,
                    record.error,
                    record.started_at_epoch_ms as i64,
                    record.ended_at_epoch_ms.map(|v| v as i64),
                ],
            )?;
            Ok(())
        })
    }

    /// Move a spawn to a terminal status, stamping `ended_at`.
    pub fn finish(
        &self,
        agent_id: &AgentId,
        status: SpawnStatus,
        exit_code: Option<i32>,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        self.gateway.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE active_spawns
                 SET status = ?2, exit_code = ?3, error = ?4, ended_at = ?5
                 WHERE agent_id = ?1",
                params![
                    agent_id.as_str(),
                    status.as_str(),
                    exit_code,
                    error,
                    now as i64,
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("spawn {agent_id}")));
            }
            Ok(())
        })
    }

    pub fn get(&self, agent_id: &AgentId) -> Result<Option<SpawnRecord>, StorageError> {
        self.gateway.with_conn(|conn| {
            conn.query_row(
                "SELECT agent_id, instance_id, project_path, task_type, description, service,
                        model, status, output_path, exit_code, error, started_at, ended_at
                 FROM active_spawns WHERE agent_id = ?1",
                params![agent_id.as_str()],
                row_to_spawn,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    pub fn running(&self) -> Result<Vec<SpawnRecord>, StorageError> {
        self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_id, instance_id, project_path, task_type, description, service,
                        model, status, output_path, exit_code, error, started_at, ended_at
                 FROM active_spawns WHERE status = 'running' ORDER BY started_at ASC",
            )?;
            let rows = stmt.query_map([], row_to_spawn)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Mark running spawns older than `max_age` as abandoned.
    ///
    /// Catches spawns whose deadline passed while no orchestrator was around
    /// to stall them (daemon restart).
    pub fn abandon_older_than(&self, max_age: Duration) -> Result<Vec<AgentId>, StorageError> {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(max_age.as_millis() as u64);
        self.gateway.with_tx(|conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_id FROM active_spawns
                 WHERE status = 'running' AND started_at < ?1",
            )?;
            let rows = stmt.query_map(params![cutoff as i64], |r| {
                r.get::<_, String>(0).map(AgentId::new)
            })?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            drop(stmt);
            for id in &ids {
                conn.execute(
                    "UPDATE active_spawns SET status = 'abandoned', ended_at = ?2
                     WHERE agent_id = ?1",
                    params![id.as_str(), now as i64],
                )?;
            }
            if !ids.is_empty() {
                info!(count = ids.len(), "spawns marked abandoned");
            }
            Ok(ids)
        })
    }

    /// Delete terminal spawn rows older than `retention`. Returns the count.
    pub fn prune_terminal_older_than(&self, retention: Duration) -> Result<usize, StorageError> {
        let cutoff = self
            .clock
            .epoch_ms()
            .saturating_sub(retention.as_millis() as u64);
        self.gateway.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM active_spawns
                 WHERE status != 'running' AND started_at < ?1",
                params![cutoff as i64],
            )?;
            Ok(deleted)
        })
    }
}

fn row_to_spawn(row: &rusqlite::Row<'_>) -> rusqlite::Result<SpawnRecord> {
    let task_name: String = row.get(3)?;
    let task_type = TaskType::parse(&task_name)
        .ok_or_else(|| column_decode_error(3, format!("unknown task type {task_name:?}")))?;
    let service_name: String = row.get(5)?;
    let service = Service::parse(&service_name)
        .ok_or_else(|| column_decode_error(5, format!("unknown service {service_name:?}")))?;
    let status_name: String = row.get(7)?;
    let status = SpawnStatus::parse(&status_name)
        .ok_or_else(|| column_decode_error(7, format!("unknown spawn status {status_name:?}")))?;
    Ok(SpawnRecord {
        agent_id: AgentId::new(row.get::<_, String>(0)?),
        instance_id: row.get::<_, Option<String>>(1)?.map(InstanceId::new),
        project_path: PathBuf::from(row.get::<_, String>(2)?),
        task_type,
        description: row.get(4)?,
        service,
        model: row.get(6)?,
        status,
        output_path: PathBuf::from(row.get::<_, String>(8)?),
        exit_code: row.get(9)?,
        error: row.get(10)?,
        started_at_epoch_ms: row.get::<_, i64>(11)? as u64,
        ended_at_epoch_ms: row.get::<_, Option<i64>>(12)?.map(|v| v as u64),
    })
}

#[cfg(test)]
#[path = "spawns_tests.rs"]
mod tests;
