// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance registry: register, heartbeat, list, lookup, close, stale sweep.

use crate::events::append_event_tx;
use crate::gateway::{column_decode_error, Gateway, StorageError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use sup_core::{
    Clock, EventType, IdGen, Instance, InstanceId, InstanceListItem, InstanceStatus, InstanceType,
    Project, STALE_AFTER_MS,
};
use tracing::{debug, info};

/// How many id-generation attempts before giving up on a unique suffix.
/// Collision odds for 6 hex are ~1/16M per attempt, so this never triggers
/// outside deliberately-seeded tests.
const MAX_ID_ATTEMPTS: usize = 16;

/// Result of a details lookup by id or 6-hex suffix prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceLookup {
    Exact(Box<Instance>),
    Multiple(Vec<Instance>),
    NotFound,
}

/// Registry of supervisor sessions.
#[derive(Clone)]
pub struct InstanceStore<C: Clock, G: IdGen> {
    gateway: Gateway,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> InstanceStore<C, G> {
    pub fn new(gateway: Gateway, clock: C, id_gen: G) -> Self {
        Self {
            gateway,
            clock,
            id_gen,
        }
    }

    /// Register a new supervisor session.
    ///
    /// Generates ids until one is unique, then writes the row and the
    /// `instance_registered` event (sequence 1) in one transaction.
    pub fn register(
        &self,
        project: &str,
        instance_type: InstanceType,
        initial_context_percent: Option<i64>,
    ) -> Result<Instance, StorageError> {
        if !Project::is_valid_slug(project) {
            return Err(StorageError::Validation(format!(
                "invalid project slug: {project:?}"
            )));
        }
        let context_percent = validate_percent(initial_context_percent.unwrap_or(0))?;
        let now = self.clock.epoch_ms();

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = InstanceId::generate(project, instance_type, &self.id_gen);
            let instance = Instance {
                id: id.clone(),
                project: project.to_string(),
                instance_type,
                status: InstanceStatus::Active,
                context_percent,
                current_epic: None,
                host_machine: None,
                created_at_epoch_ms: now,
                last_heartbeat_epoch_ms: now,
                closed_at_epoch_ms: None,
            };
            let result = self.gateway.with_tx(|conn| {
                conn.execute(
                    "INSERT INTO instances
                       (instance_id, project, instance_type, status, context_percent,
                        created_at, last_heartbeat)
                     VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?5)",
                    params![
                        id.as_str(),
                        project,
                        instance_type.as_str(),
                        context_percent as i64,
                        now as i64,
                    ],
                )?;
                append_event_tx(
                    conn,
                    now,
                    &id,
                    EventType::InstanceRegistered,
                    json!({
                        "project": project,
                        "instance_type": instance_type.as_str(),
                        "context_percent": context_percent,
                    }),
                    json!({}),
                )?;
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!(instance_id = %id, project, "instance registered");
                    return Ok(instance);
                }
                Err(e) if e.is_constraint_violation() => {
                    debug!(instance_id = %id, "instance id collision, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::Conflict(format!(
            "could not allocate a unique instance id for {project} after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Record a heartbeat.
    ///
    /// Strictly validates `context_percent` (0..=100). A stale instance is
    /// revived to `active`; a closed one is a conflict.
    pub fn heartbeat(
        &self,
        instance_id: &InstanceId,
        context_percent: i64,
        current_epic: Option<String>,
    ) -> Result<Instance, StorageError> {
        let pct = validate_percent(context_percent)?;
        let now = self.clock.epoch_ms();
        self.gateway.with_tx(|conn| {
            let existing = get_tx(conn, instance_id)?
                .ok_or_else(|| StorageError::NotFound(format!("instance {instance_id}")))?;
            if existing.is_closed() {
                return Err(StorageError::Conflict(format!(
                    "instance {instance_id} is closed"
                )));
            }

            let epic = current_epic.clone().or(existing.current_epic.clone());
            conn.execute(
                "UPDATE instances
                 SET status = 'active', context_percent = ?2, current_epic = ?3,
                     last_heartbeat = ?4
                 WHERE instance_id = ?1",
                params![instance_id.as_str(), pct as i64, epic, now as i64],
            )?;

            append_event_tx(
                conn,
                now,
                instance_id,
                EventType::InstanceHeartbeat,
                json!({
                    "context_percent": pct,
                    "revived": existing.status == InstanceStatus::Stale,
                }),
                json!({}),
            )?;
            if existing.context_percent != pct {
                append_event_tx(
                    conn,
                    now,
                    instance_id,
                    EventType::ContextWindowUpdated,
                    json!({ "from": existing.context_percent, "to": pct }),
                    json!({}),
                )?;
            }

            Ok(Instance {
                status: InstanceStatus::Active,
                context_percent: pct,
                current_epic: epic,
                last_heartbeat_epoch_ms: now,
                ..existing
            })
        })
    }

    /// List instances: project ascending, then most recent heartbeat first.
    pub fn list(
        &self,
        project: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<InstanceListItem>, StorageError> {
        let now = self.clock.epoch_ms();
        self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT instance_id, project, instance_type, status, context_percent,
                        current_epic, host_machine, created_at, last_heartbeat, closed_at
                 FROM instances
                 WHERE (?1 IS NULL OR project = ?1)
                   AND (?2 = 0 OR status != 'closed')
                 ORDER BY project ASC, last_heartbeat DESC",
            )?;
            let rows = stmt.query_map(params![project, active_only], row_to_instance)?;
            let mut out = Vec::new();
            for row in rows {
                let instance = row?;
                out.push(InstanceListItem {
                    age_seconds: instance.age_seconds_at(now),
                    stale: instance.is_stale_at(now)
                        || instance.status == InstanceStatus::Stale,
                    instance,
                });
            }
            Ok(out)
        })
    }

    pub fn get(&self, instance_id: &InstanceId) -> Result<Instance, StorageError> {
        self.gateway.with_conn(|conn| {
            get_tx(conn, instance_id)?
                .ok_or_else(|| StorageError::NotFound(format!("instance {instance_id}")))
        })
    }

    /// Resolve an exact id or a prefix of the 6-hex suffix.
    ///
    /// Exactly one match resolves; more than one returns `Multiple`. A
    /// prefix is never silently resolved to an arbitrary row.
    pub fn get_details(&self, id_or_prefix: &str) -> Result<InstanceLookup, StorageError> {
        self.gateway.with_conn(|conn| {
            if let Some(instance) = get_tx(conn, &InstanceId::new(id_or_prefix))? {
                return Ok(InstanceLookup::Exact(Box::new(instance)));
            }

            if id_or_prefix.is_empty()
                || id_or_prefix.len() > 6
                || !id_or_prefix
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                return Err(StorageError::Validation(format!(
                    "not an instance id or suffix prefix: {id_or_prefix:?}"
                )));
            }

            let mut stmt = conn.prepare(
                "SELECT instance_id, project, instance_type, status, context_percent,
                        current_epic, host_machine, created_at, last_heartbeat, closed_at
                 FROM instances
                 WHERE substr(instance_id, -6) LIKE ?1 || '%'
                 ORDER BY last_heartbeat DESC",
            )?;
            let rows = stmt.query_map(params![id_or_prefix], row_to_instance)?;
            let mut matches = Vec::new();
            for row in rows {
                matches.push(row?);
            }
            Ok(match matches.len() {
                0 => InstanceLookup::NotFound,
                1 => InstanceLookup::Exact(Box::new(
                    matches.pop().ok_or_else(|| {
                        StorageError::Validation("lookup invariant".to_string())
                    })?,
                )),
                _ => InstanceLookup::Multiple(matches),
            })
        })
    }

    /// Close an instance. Idempotent: closing a closed instance returns the
    /// existing row without appending anything.
    pub fn close(&self, instance_id: &InstanceId) -> Result<Instance, StorageError> {
        let now = self.clock.epoch_ms();
        self.gateway.with_tx(|conn| {
            let existing = get_tx(conn, instance_id)?
                .ok_or_else(|| StorageError::NotFound(format!("instance {instance_id}")))?;
            if existing.is_closed() {
                return Ok(existing);
            }

            // Terminal event first, while the row still accepts appends
            append_event_tx(
                conn,
                now,
                instance_id,
                EventType::InstanceClosed,
                json!({}),
                json!({}),
            )?;
            conn.execute(
                "UPDATE instances SET status = 'closed', closed_at = ?2 WHERE instance_id = ?1",
                params![instance_id.as_str(), now as i64],
            )?;

            info!(instance_id = %instance_id, "instance closed");
            Ok(Instance {
                status: InstanceStatus::Closed,
                closed_at_epoch_ms: Some(now),
                ..existing
            })
        })
    }

    /// One stale-detection pass: active instances whose last heartbeat is
    /// older than the threshold transition to `stale` (never auto-closed).
    pub fn sweep_stale(&self) -> Result<Vec<InstanceId>, StorageError> {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(STALE_AFTER_MS);
        let candidates: Vec<InstanceId> = self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT instance_id FROM instances
                 WHERE status = 'active' AND last_heartbeat < ?1",
            )?;
            let rows = stmt.query_map(params![cutoff as i64], |r| {
                r.get::<_, String>(0).map(InstanceId::new)
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })?;

        // Short transaction per instance so the sweep never starves writers
        let mut swept = Vec::new();
        for id in candidates {
            self.gateway.with_tx(|conn| {
                let changed = conn.execute(
                    "UPDATE instances SET status = 'stale'
                     WHERE instance_id = ?1 AND status = 'active' AND last_heartbeat < ?2",
                    params![id.as_str(), cutoff as i64],
                )?;
                if changed > 0 {
                    append_event_tx(
                        conn,
                        now,
                        &id,
                        EventType::InstanceStale,
                        json!({}),
                        json!({}),
                    )?;
                }
                Ok(changed > 0)
            })
            .map(|transitioned| {
                if transitioned {
                    swept.push(id.clone());
                }
            })?;
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "instances marked stale");
        }
        Ok(swept)
    }
}

fn validate_percent(value: i64) -> Result<u8, StorageError> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(StorageError::Validation(format!(
            "context_percent must be 0..=100, got {value}"
        )))
    }
}

fn get_tx(conn: &Connection, instance_id: &InstanceId) -> Result<Option<Instance>, StorageError> {
    conn.query_row(
        "SELECT instance_id, project, instance_type, status, context_percent,
                current_epic, host_machine, created_at, last_heartbeat, closed_at
         FROM instances WHERE instance_id = ?1",
        params![instance_id.as_str()],
        row_to_instance,
    )
    .optional()
    .map_err(StorageError::from)
}

fn row_to_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Instance> {
    let type_name: String = row.get(2)?;
    let instance_type = InstanceType::parse(&type_name)
        .ok_or_else(|| column_decode_error(2, format!("unknown instance type {type_name:?}")))?;
    let status_name: String = row.get(3)?;
    let status = InstanceStatus::parse(&status_name)
        .ok_or_else(|| column_decode_error(3, format!("unknown status {status_name:?}")))?;
    Ok(Instance {
        id: InstanceId::new(row.get::<_, String>(0)?),
        project: row.get(1)?,
        instance_type,
        status,
        context_percent: row.get::<_, i64>(4)? as u8,
        current_epic: row.get(5)?,
        host_machine: row.get(6)?,
        created_at_epoch_ms: row.get::<_, i64>(7)? as u64,
        last_heartbeat_epoch_ms: row.get::<_, i64>(8)? as u64,
        closed_at_epoch_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
    })
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
