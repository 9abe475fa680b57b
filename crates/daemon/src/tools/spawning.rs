// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subagent spawn and epic orchestration tools.

use super::{args, engine_caller, to_value, ToolDeps};
use crate::registry::{ToolDef, ToolError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use sup_core::{Clock, ComplexityHint, IdGen, TaskType, META_PROJECT};
use sup_engine::EpicRequest;

#[derive(Deserialize)]
struct SpawnArgs {
    task_type: String,
    description: String,
    #[serde(default)]
    context: Map<String, Value>,
    #[serde(default)]
    complexity_hint: Option<String>,
    #[serde(default)]
    estimated_tokens: Option<u64>,
    #[serde(default)]
    deadline_minutes: Option<u64>,
}

#[derive(Deserialize)]
struct EpicArgs {
    epic_file: String,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default)]
    create_pr: bool,
    #[serde(default)]
    completed_tasks: Vec<String>,
}

fn task_type_names() -> Vec<&'static str> {
    TaskType::ALL.iter().map(|t| t.as_str()).collect()
}

fn epic_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "epic_file": { "type": "string" },
            "project_name": { "type": "string" },
            "project_path": { "type": "string" },
            "create_pr": { "type": "boolean" },
            "completed_tasks": { "type": "array", "items": { "type": "string" } },
            "instance_id": { "type": "string" }
        },
        "required": ["epic_file"]
    })
}

/// Build the epic request, resolving relative epic paths against the
/// project tree.
fn epic_request(
    a: EpicArgs,
    ctx: &crate::registry::ToolCtx,
) -> Result<EpicRequest, ToolError> {
    let project_path = a
        .project_path
        .map(PathBuf::from)
        .or_else(|| {
            (ctx.project.name != META_PROJECT).then(|| ctx.project.path.clone())
        });
    let epic_file = {
        let raw = PathBuf::from(&a.epic_file);
        if raw.is_absolute() {
            raw
        } else {
            match &project_path {
                Some(base) => base.join(raw),
                None => {
                    return Err(ToolError::validation(
                        "epic_file must be absolute when no project context exists",
                    ))
                }
            }
        }
    };
    Ok(EpicRequest {
        project_name: a
            .project_name
            .or_else(|| (ctx.project.name != META_PROJECT).then(|| ctx.project.name.clone())),
        project_path,
        epic_file,
        create_pr: a.create_pr,
    })
}

pub(super) fn defs<C: Clock, G: IdGen>(deps: &ToolDeps<C, G>) -> Vec<ToolDef> {
    let spawn = {
        let d = deps.clone();
        ToolDef::new(
            "spawn_subagent",
            "Route, prompt, and run one AI subagent against the project working directory.",
            json!({
                "type": "object",
                "properties": {
                    "task_type": { "type": "string", "enum": task_type_names() },
                    "description": { "type": "string" },
                    "context": { "type": "object" },
                    "complexity_hint": {
                        "type": "string",
                        "enum": ["simple", "moderate", "complex"]
                    },
                    "estimated_tokens": { "type": "integer" },
                    "deadline_minutes": { "type": "integer" },
                    "instance_id": { "type": "string" }
                },
                "required": ["task_type", "description"]
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: SpawnArgs = args(params)?;
                    let task_type = TaskType::parse(&a.task_type).ok_or_else(|| {
                        ToolError::validation(format!("unknown task type {:?}", a.task_type))
                    })?;
                    let complexity_hint = match a.complexity_hint.as_deref() {
                        None => None,
                        Some(hint) => Some(ComplexityHint::parse(hint).ok_or_else(|| {
                            ToolError::validation(format!("unknown complexity hint {hint:?}"))
                        })?),
                    };
                    let spawn_params = sup_engine::SpawnParams {
                        task_type,
                        description: a.description,
                        context: a.context,
                        complexity_hint,
                        estimated_tokens: a.estimated_tokens,
                        deadline: a
                            .deadline_minutes
                            .map(|m| std::time::Duration::from_secs(m * 60)),
                    };
                    let outcome = d
                        .engine
                        .spawn_subagent(spawn_params, &engine_caller(&ctx))
                        .await?;
                    to_value(&outcome)
                }
            },
        )
    };

    let implement = {
        let d = deps.clone();
        ToolDef::new(
            "implement_epic",
            "Execute an epic end to end: every implementation note in order, then one \
             validation subagent per acceptance criterion.",
            epic_schema(),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: EpicArgs = args(params)?;
                    let req = epic_request(a, &ctx)?;
                    let outcome = d
                        .orchestrator
                        .implement_epic(&req, &engine_caller(&ctx))
                        .await?;
                    to_value(&outcome)
                }
            },
        )
    };

    let run_prime = {
        let d = deps.clone();
        ToolDef::new(
            "run_prime",
            "One-shot prime phase: research the epic and prime context.",
            epic_schema(),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: EpicArgs = args(params)?;
                    let req = epic_request(a, &ctx)?;
                    let outcome = d.orchestrator.run_prime(&req, &engine_caller(&ctx)).await?;
                    to_value(&outcome)
                }
            },
        )
    };

    let run_plan = {
        let d = deps.clone();
        ToolDef::new(
            "run_plan",
            "One-shot plan phase: produce the ordered implementation plan.",
            epic_schema(),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: EpicArgs = args(params)?;
                    let req = epic_request(a, &ctx)?;
                    let outcome = d.orchestrator.run_plan(&req, &engine_caller(&ctx)).await?;
                    to_value(&outcome)
                }
            },
        )
    };

    let run_execute = {
        let d = deps.clone();
        ToolDef::new(
            "run_execute",
            "Execute phase with restart support: completed_tasks carries steps already done.",
            epic_schema(),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: EpicArgs = args(params)?;
                    let completed = a.completed_tasks.clone();
                    let req = epic_request(a, &ctx)?;
                    let outcome = d
                        .orchestrator
                        .run_execute(&req, completed, &engine_caller(&ctx))
                        .await?;
                    to_value(&outcome)
                }
            },
        )
    };

    vec![spawn, implement, run_prime, run_plan, run_execute]
}
