// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event stream, command audit log, and checkpoints.
//!
//! Sequence numbers are assigned as `max + 1` inside the insert transaction;
//! SQLite's single-writer discipline serializes appends per instance, and the
//! `(instance_id, sequence_num)` unique constraint backstops the density
//! invariant.

use crate::gateway::{column_decode_error, Gateway, StorageError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sup_core::{
    Checkpoint, CheckpointType, Clock, CommandEntry, CommandRecord, EventRecord, EventType,
    InstanceId, InstanceStatus,
};

/// Store for per-instance events, command audit rows, and checkpoints.
#[derive(Clone)]
pub struct EventStore<C: Clock> {
    gateway: Gateway,
    clock: C,
}

impl<C: Clock> EventStore<C> {
    pub fn new(gateway: Gateway, clock: C) -> Self {
        Self { gateway, clock }
    }

    /// Append one event to an instance stream.
    ///
    /// Fails `NotFound` for unknown instances and `Conflict` for closed ones
    /// (a closed instance accepts no further events).
    pub fn append(
        &self,
        instance_id: &InstanceId,
        event_type: EventType,
        event_data: Value,
        metadata: Value,
    ) -> Result<EventRecord, StorageError> {
        let now = self.clock.epoch_ms();
        self.gateway
            .with_tx(|conn| append_event_tx(conn, now, instance_id, event_type, event_data, metadata))
    }

    /// Events for an instance in sequence order, starting at `from_seq`.
    ///
    /// Restartable: callers resume by passing the last sequence they saw + 1.
    pub fn replay(
        &self,
        instance_id: &InstanceId,
        from_seq: u64,
    ) -> Result<Vec<EventRecord>, StorageError> {
        self.gateway.with_conn(|conn| {
            require_instance(conn, instance_id)?;
            let mut stmt = conn.prepare(
                "SELECT event_id, instance_id, sequence_num, event_type, event_data, metadata,
                        timestamp, created_at
                 FROM events WHERE instance_id = ?1 AND sequence_num >= ?2
                 ORDER BY sequence_num ASC",
            )?;
            let rows = stmt.query_map(params![instance_id.as_str(), from_seq as i64], row_to_event)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Highest sequence number in an instance's stream (0 when empty).
    pub fn max_seq(&self, instance_id: &InstanceId) -> Result<u64, StorageError> {
        self.gateway.with_conn(|conn| max_seq_tx(conn, instance_id))
    }

    /// Append one command-audit row.
    ///
    /// `instance_id: None` records against the anonymous sink.
    pub fn log_command(
        &self,
        instance_id: Option<&InstanceId>,
        entry: CommandEntry,
    ) -> Result<CommandRecord, StorageError> {
        let now = self.clock.epoch_ms();
        self.gateway.with_tx(|conn| {
            if let Some(id) = instance_id {
                require_instance(conn, id)?;
            }
            conn.execute(
                "INSERT INTO command_log
                   (instance_id, command_type, action, tool_name, parameters, result,
                    success, error_message, execution_time_ms, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    instance_id.map(|i| i.as_str()),
                    entry.command_type,
                    entry.action,
                    entry.tool_name,
                    serde_json::to_string(&entry.parameters)?,
                    entry
                        .result
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    entry.success,
                    entry.error_message,
                    entry.execution_time_ms.map(|v| v as i64),
                    serde_json::to_string(&entry.tags)?,
                    now as i64,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(CommandRecord {
                id,
                instance_id: instance_id.cloned(),
                entry,
                created_at_epoch_ms: now,
            })
        })
    }

    /// Command rows, newest first, optionally filtered by instance.
    pub fn commands(
        &self,
        instance_id: Option<&InstanceId>,
        limit: usize,
    ) -> Result<Vec<CommandRecord>, StorageError> {
        self.gateway.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, instance_id, command_type, action, tool_name, parameters, result,
                        success, error_message, execution_time_ms, tags, created_at
                 FROM command_log
                 WHERE (?1 IS NULL AND instance_id IS NULL) OR instance_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(
                params![instance_id.map(|i| i.as_str()), limit as i64],
                row_to_command,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Store an advisory checkpoint at the current stream position.
    ///
    /// Emits `checkpoint_created`; the checkpoint carries that event's
    /// sequence number.
    pub fn create_checkpoint(
        &self,
        instance_id: &InstanceId,
        checkpoint_type: CheckpointType,
        work_state: Value,
        context_window_percent: i64,
    ) -> Result<Checkpoint, StorageError> {
        if !(0..=100).contains(&context_window_percent) {
            return Err(StorageError::Validation(format!(
                "context_window_percent must be 0..=100, got {context_window_percent}"
            )));
        }
        let now = self.clock.epoch_ms();
        self.gateway.with_tx(|conn| {
            let event = append_event_tx(
                conn,
                now,
                instance_id,
                EventType::CheckpointCreated,
                serde_json::json!({
                    "checkpoint_type": checkpoint_type.as_str(),
                    "context_window_percent": context_window_percent,
                }),
                Value::Object(Default::default()),
            )?;
            let checkpoint_id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO checkpoints
                   (checkpoint_id, instance_id, sequence_num, checkpoint_type,
                    context_window_percent, work_state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    checkpoint_id,
                    instance_id.as_str(),
                    event.sequence_num as i64,
                    checkpoint_type.as_str(),
                    context_window_percent,
                    serde_json::to_string(&work_state)?,
                    now as i64,
                ],
            )?;
            Ok(Checkpoint {
                checkpoint_id,
                instance_id: instance_id.clone(),
                sequence_num: event.sequence_num,
                checkpoint_type,
                context_window_percent: context_window_percent as u8,
                work_state,
                created_at_epoch_ms: now,
            })
        })
    }

    /// Most recent checkpoint without logging an event.
    pub fn latest_checkpoint(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        self.gateway.with_conn(|conn| {
            require_instance(conn, instance_id)?;
            conn.query_row(
                "SELECT checkpoint_id, instance_id, sequence_num, checkpoint_type,
                        context_window_percent, work_state, created_at
                 FROM checkpoints WHERE instance_id = ?1
                 ORDER BY created_at DESC, sequence_num DESC LIMIT 1",
                params![instance_id.as_str()],
                row_to_checkpoint,
            )
            .optional()
            .map_err(StorageError::from)
        })
    }

    /// Load the most recent checkpoint for recovery, emitting
    /// `checkpoint_loaded` when one exists.
    pub fn load_latest_checkpoint(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let checkpoint = self.latest_checkpoint(instance_id)?;
        if let Some(cp) = &checkpoint {
            self.append(
                instance_id,
                EventType::CheckpointLoaded,
                serde_json::json!({
                    "checkpoint_id": cp.checkpoint_id,
                    "sequence_num": cp.sequence_num,
                }),
                Value::Object(Default::default()),
            )?;
        }
        Ok(checkpoint)
    }
}

/// Append an event inside an already-open transaction.
pub(crate) fn append_event_tx(
    conn: &Connection,
    now_epoch_ms: u64,
    instance_id: &InstanceId,
    event_type: EventType,
    event_data: Value,
    metadata: Value,
) -> Result<EventRecord, StorageError> {
    let status = instance_status_tx(conn, instance_id)?;
    if status == InstanceStatus::Closed {
        return Err(StorageError::Conflict(format!(
            "instance {instance_id} is closed"
        )));
    }
    let sequence_num = max_seq_tx(conn, instance_id)? + 1;
    let event_id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO events
           (event_id, instance_id, sequence_num, event_type, event_data, metadata,
            timestamp, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event_id,
            instance_id.as_str(),
            sequence_num as i64,
            event_type.name(),
            serde_json::to_string(&event_data)?,
            serde_json::to_string(&metadata)?,
            now_epoch_ms as i64,
            now_epoch_ms as i64,
        ],
    )?;
    Ok(EventRecord {
        event_id,
        instance_id: instance_id.clone(),
        sequence_num,
        event_type,
        event_data,
        metadata,
        timestamp_epoch_ms: now_epoch_ms,
        created_at_epoch_ms: now_epoch_ms,
    })
}

pub(crate) fn max_seq_tx(conn: &Connection, instance_id: &InstanceId) -> Result<u64, StorageError> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence_num), 0) FROM events WHERE instance_id = ?1",
        params![instance_id.as_str()],
        |r| r.get(0),
    )?;
    Ok(max as u64)
}

pub(crate) fn instance_status_tx(
    conn: &Connection,
    instance_id: &InstanceId,
) -> Result<InstanceStatus, StorageError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM instances WHERE instance_id = ?1",
            params![instance_id.as_str()],
            |r| r.get(0),
        )
        .optional()?;
    let status =
        status.ok_or_else(|| StorageError::NotFound(format!("instance {instance_id}")))?;
    InstanceStatus::parse(&status)
        .ok_or_else(|| StorageError::Validation(format!("bad instance status {status:?}")))
}

fn require_instance(conn: &Connection, instance_id: &InstanceId) -> Result<(), StorageError> {
    instance_status_tx(conn, instance_id).map(|_| ())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    let type_name: String = row.get(3)?;
    let event_type = EventType::parse(&type_name)
        .ok_or_else(|| column_decode_error(3, format!("unknown event type {type_name:?}")))?;
    let data_text: String = row.get(4)?;
    let meta_text: String = row.get(5)?;
    Ok(EventRecord {
        event_id: row.get(0)?,
        instance_id: InstanceId::new(row.get::<_, String>(1)?),
        sequence_num: row.get::<_, i64>(2)? as u64,
        event_type,
        event_data: serde_json::from_str(&data_text)
            .map_err(|e| column_decode_error(4, e.to_string()))?,
        metadata: serde_json::from_str(&meta_text)
            .map_err(|e| column_decode_error(5, e.to_string()))?,
        timestamp_epoch_ms: row.get::<_, i64>(6)? as u64,
        created_at_epoch_ms: row.get::<_, i64>(7)? as u64,
    })
}

fn row_to_command(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommandRecord> {
    let params_text: String = row.get(5)?;
    let result_text: Option<String> = row.get(6)?;
    let tags_text: String = row.get(10)?;
    Ok(CommandRecord {
        id: row.get(0)?,
        instance_id: row
            .get::<_, Option<String>>(1)?
            .map(InstanceId::new),
        entry: CommandEntry {
            command_type: row.get(2)?,
            action: row.get(3)?,
            tool_name: row.get(4)?,
            parameters: serde_json::from_str(&params_text)
                .map_err(|e| column_decode_error(5, e.to_string()))?,
            result: result_text
                .map(|t| serde_json::from_str(&t))
                .transpose()
                .map_err(|e| column_decode_error(6, e.to_string()))?,
            success: row.get(7)?,
            error_message: row.get(8)?,
            execution_time_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
            tags: serde_json::from_str(&tags_text)
                .map_err(|e| column_decode_error(10, e.to_string()))?,
        },
        created_at_epoch_ms: row.get::<_, i64>(11)? as u64,
    })
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    let type_name: String = row.get(3)?;
    let checkpoint_type = CheckpointType::parse(&type_name)
        .ok_or_else(|| column_decode_error(3, format!("unknown checkpoint type {type_name:?}")))?;
    let state_text: String = row.get(5)?;
    Ok(Checkpoint {
        checkpoint_id: row.get(0)?,
        instance_id: InstanceId::new(row.get::<_, String>(1)?),
        sequence_num: row.get::<_, i64>(2)? as u64,
        checkpoint_type,
        context_window_percent: row.get::<_, i64>(4)? as u8,
        work_state: serde_json::from_str(&state_text)
            .map_err(|e| column_decode_error(5, e.to_string()))?,
        created_at_epoch_ms: row.get::<_, i64>(6)? as u64,
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
