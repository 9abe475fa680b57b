// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance registry, event log, and checkpoint tools.

use super::{args, to_value, ToolDeps};
use crate::registry::{ToolDef, ToolError};
use serde::Deserialize;
use serde_json::{json, Value};
use sup_core::{
    CheckpointType, Clock, EventType, IdGen, InstanceId, InstanceType, META_PROJECT,
};
use sup_storage::InstanceLookup;

#[derive(Deserialize)]
struct RegisterArgs {
    #[serde(default)]
    project: Option<String>,
    instance_type: String,
    #[serde(default)]
    context_percent: Option<i64>,
}

#[derive(Deserialize)]
struct HeartbeatArgs {
    instance_id: String,
    context_percent: i64,
    #[serde(default)]
    current_epic: Option<String>,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    active_only: bool,
}

#[derive(Deserialize)]
struct GetArgs {
    id_or_prefix: String,
}

#[derive(Deserialize)]
struct CloseArgs {
    instance_id: String,
}

#[derive(Deserialize)]
struct LogEventArgs {
    instance_id: String,
    event_type: String,
    #[serde(default)]
    event_data: Value,
    #[serde(default)]
    metadata: Value,
}

#[derive(Deserialize)]
struct ReplayArgs {
    instance_id: String,
    #[serde(default = "default_from_seq")]
    from_seq: u64,
}

fn default_from_seq() -> u64 {
    1
}

#[derive(Deserialize)]
struct CheckpointArgs {
    instance_id: String,
    #[serde(default = "default_checkpoint_type")]
    checkpoint_type: String,
    #[serde(default)]
    work_state: Value,
    context_window_percent: i64,
}

fn default_checkpoint_type() -> String {
    "manual".to_string()
}

#[derive(Deserialize)]
struct LoadCheckpointArgs {
    instance_id: String,
}

fn event_type_names() -> Vec<&'static str> {
    EventType::ALL.iter().map(|t| t.name()).collect()
}

pub(super) fn defs<C: Clock, G: IdGen>(deps: &ToolDeps<C, G>) -> Vec<ToolDef> {
    let register = {
        let d = deps.clone();
        ToolDef::new(
            "register_instance",
            "Register a new supervisor session for a project. Returns the instance record.",
            json!({
                "type": "object",
                "properties": {
                    "project": { "type": "string" },
                    "instance_type": { "type": "string", "enum": ["PS", "MS"] },
                    "context_percent": { "type": "integer" }
                },
                "required": ["instance_type"]
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: RegisterArgs = args(params)?;
                    let project = match a.project {
                        Some(project) => project,
                        None if ctx.project.name != META_PROJECT => ctx.project.name.clone(),
                        None => {
                            return Err(ToolError::validation(
                                "project is required on the meta endpoint",
                            ))
                        }
                    };
                    let instance_type = InstanceType::parse(&a.instance_type).ok_or_else(|| {
                        ToolError::validation(format!(
                            "instance_type must be PS or MS, got {:?}",
                            a.instance_type
                        ))
                    })?;
                    let instance = d.instances.register(&project, instance_type, a.context_percent)?;
                    to_value(&instance)
                }
            },
        )
    };

    let heartbeat = {
        let d = deps.clone();
        ToolDef::new(
            "heartbeat",
            "Record a heartbeat for an instance, updating context usage and current epic.",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": { "type": "string" },
                    "context_percent": { "type": "integer" },
                    "current_epic": { "type": "string" }
                },
                "required": ["instance_id", "context_percent"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: HeartbeatArgs = args(params)?;
                    let instance = d.instances.heartbeat(
                        &InstanceId::new(a.instance_id),
                        a.context_percent,
                        a.current_epic,
                    )?;
                    to_value(&instance)
                }
            },
        )
    };

    let list = {
        let d = deps.clone();
        ToolDef::new(
            "list_instances",
            "List supervisor sessions with derived age and staleness.",
            json!({
                "type": "object",
                "properties": {
                    "project": { "type": "string" },
                    "active_only": { "type": "boolean" }
                }
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: ListArgs = args(params)?;
                    // Project endpoints stay inside their own project
                    let project = if ctx.project.name == META_PROJECT {
                        a.project
                    } else {
                        match a.project {
                            Some(requested) if requested != ctx.project.name => {
                                return Err(ToolError::validation(format!(
                                    "endpoint {} cannot list project {requested}",
                                    ctx.project.name
                                )))
                            }
                            _ => Some(ctx.project.name.clone()),
                        }
                    };
                    let items = d.instances.list(project.as_deref(), a.active_only)?;
                    to_value(&json!({ "instances": items }))
                }
            },
        )
    };

    let get = {
        let d = deps.clone();
        ToolDef::new(
            "get_instance",
            "Resolve an instance by full id or 6-hex suffix prefix. \
             Ambiguous prefixes return every match.",
            json!({
                "type": "object",
                "properties": { "id_or_prefix": { "type": "string" } },
                "required": ["id_or_prefix"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: GetArgs = args(params)?;
                    let result = match d.instances.get_details(&a.id_or_prefix)? {
                        InstanceLookup::Exact(instance) => json!({
                            "match": "exact",
                            "instance": instance,
                        }),
                        InstanceLookup::Multiple(instances) => json!({
                            "match": "multiple",
                            "instances": instances,
                        }),
                        InstanceLookup::NotFound => json!({ "match": "not_found" }),
                    };
                    Ok(result)
                }
            },
        )
    };

    let close = {
        let d = deps.clone();
        ToolDef::new(
            "close_instance",
            "Close a supervisor session. Idempotent.",
            json!({
                "type": "object",
                "properties": { "instance_id": { "type": "string" } },
                "required": ["instance_id"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: CloseArgs = args(params)?;
                    let instance = d.instances.close(&InstanceId::new(a.instance_id))?;
                    to_value(&instance)
                }
            },
        )
    };

    let log_event = {
        let d = deps.clone();
        ToolDef::new(
            "log_event",
            "Append one event to an instance stream. Event types are a closed set.",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": { "type": "string" },
                    "event_type": { "type": "string", "enum": event_type_names() },
                    "event_data": { "type": "object" },
                    "metadata": { "type": "object" }
                },
                "required": ["instance_id", "event_type"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: LogEventArgs = args(params)?;
                    let event_type = EventType::parse(&a.event_type).ok_or_else(|| {
                        ToolError::validation(format!("unknown event type {:?}", a.event_type))
                    })?;
                    let record = d.events.append(
                        &InstanceId::new(a.instance_id),
                        event_type,
                        or_empty_object(a.event_data),
                        or_empty_object(a.metadata),
                    )?;
                    to_value(&record)
                }
            },
        )
    };

    let replay = {
        let d = deps.clone();
        ToolDef::new(
            "replay_events",
            "Events for an instance in sequence order, restartable from any sequence number.",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": { "type": "string" },
                    "from_seq": { "type": "integer" }
                },
                "required": ["instance_id"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: ReplayArgs = args(params)?;
                    let events = d
                        .events
                        .replay(&InstanceId::new(a.instance_id), a.from_seq)?;
                    to_value(&json!({ "events": events }))
                }
            },
        )
    };

    let checkpoint = {
        let d = deps.clone();
        ToolDef::new(
            "create_checkpoint",
            "Store an advisory work-state snapshot at the current stream position.",
            json!({
                "type": "object",
                "properties": {
                    "instance_id": { "type": "string" },
                    "checkpoint_type": { "type": "string", "enum": ["manual", "automatic"] },
                    "work_state": { "type": "object" },
                    "context_window_percent": { "type": "integer" }
                },
                "required": ["instance_id", "context_window_percent"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: CheckpointArgs = args(params)?;
                    let checkpoint_type =
                        CheckpointType::parse(&a.checkpoint_type).ok_or_else(|| {
                            ToolError::validation(format!(
                                "unknown checkpoint type {:?}",
                                a.checkpoint_type
                            ))
                        })?;
                    let checkpoint = d.events.create_checkpoint(
                        &InstanceId::new(a.instance_id),
                        checkpoint_type,
                        or_empty_object(a.work_state),
                        a.context_window_percent,
                    )?;
                    to_value(&checkpoint)
                }
            },
        )
    };

    let load_checkpoint = {
        let d = deps.clone();
        ToolDef::new(
            "load_checkpoint",
            "Load the latest checkpoint for recovery; the event stream stays canonical.",
            json!({
                "type": "object",
                "properties": { "instance_id": { "type": "string" } },
                "required": ["instance_id"]
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: LoadCheckpointArgs = args(params)?;
                    let checkpoint = d
                        .events
                        .load_latest_checkpoint(&InstanceId::new(a.instance_id))?;
                    to_value(&json!({ "checkpoint": checkpoint }))
                }
            },
        )
    };

    vec![
        register,
        heartbeat,
        list,
        get,
        close,
        log_event,
        replay,
        checkpoint,
        load_checkpoint,
    ]
}

fn or_empty_object(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    }
}
