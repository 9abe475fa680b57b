// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builtin tool set.
//!
//! These handlers bind the registry to the storage and engine layers. Hosts
//! register collaborator tools (port allocator, DNS, mobile helpers, …)
//! through the same [`ToolRegistry`] API; the registry guarantees their
//! scoping and schema validation, nothing more.

mod instances;
mod meta;
mod secrets;
mod spawning;

use crate::endpoint::StatsHub;
use crate::registry::{ToolCtx, ToolError, ToolRegistry};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use sup_core::{Clock, IdGen, ProjectSet, META_PROJECT};
use sup_engine::{CallerContext, Orchestrator, SpawnEngine};
use sup_storage::{EventStore, InstanceStore, SecretStore, SpawnStore};

/// Tools visible only on the meta endpoint.
pub const META_ONLY_TOOLS: [&str; 2] = ["endpoint_stats", "reload_projects"];

/// Everything the builtin tools need, injected at construction.
#[derive(Clone)]
pub struct ToolDeps<C: Clock, G: IdGen> {
    pub instances: InstanceStore<C, G>,
    pub events: EventStore<C>,
    pub spawns: SpawnStore<C>,
    /// Absent when no `SUP_SECRET_KEY` is configured
    pub secrets: Option<SecretStore<C>>,
    pub engine: Arc<SpawnEngine<C, G>>,
    pub orchestrator: Arc<Orchestrator<C, G>>,
    pub stats: StatsHub,
    pub reload_tx: tokio::sync::mpsc::Sender<()>,
    pub start_time: std::time::Instant,
}

/// Register every builtin tool.
pub fn register_builtin<C: Clock, G: IdGen>(
    registry: &ToolRegistry,
    deps: &ToolDeps<C, G>,
) -> Result<(), ToolError> {
    for def in instances::defs(deps)
        .into_iter()
        .chain(spawning::defs(deps))
        .chain(secrets::defs(deps))
        .chain(meta::defs(deps))
    {
        registry.register_tool(def)?;
    }
    Ok(())
}

/// Apply per-project scoping from a snapshot.
///
/// A project with an explicit tools list sees exactly that list; otherwise
/// it sees everything except the meta-only tools. The meta endpoint has no
/// scope entry and therefore sees the full set.
pub fn apply_scopes(registry: &ToolRegistry, snapshot: &ProjectSet) {
    let all: Vec<String> = registry.tool_names();
    for project in snapshot.iter() {
        let names: Vec<String> = if project.tools.is_empty() {
            all.iter()
                .filter(|n| !META_ONLY_TOOLS.contains(&n.as_str()))
                .cloned()
                .collect()
        } else {
            project
                .tools
                .iter()
                .filter(|n| !META_ONLY_TOOLS.contains(&n.as_str()))
                .cloned()
                .collect()
        };
        registry.set_project_tools(&project.name, names);
    }
}

/// Deserialize tool arguments, mapping failures to validation errors.
fn args<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::validation(e.to_string()))
}

/// Serialize a tool result, mapping failures to internal errors.
fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::internal(e.to_string()))
}

/// Caller context for the engine: the endpoint project (unless meta) plus
/// the caller-supplied instance.
fn engine_caller(ctx: &ToolCtx) -> CallerContext {
    CallerContext {
        instance_id: ctx.instance_id.clone(),
        project: (ctx.project.name != META_PROJECT).then(|| Arc::clone(&ctx.project)),
    }
}

/// Who to record as the actor for secret accesses.
fn accessed_by(ctx: &ToolCtx) -> String {
    match &ctx.instance_id {
        Some(id) => id.to_string(),
        None => format!("endpoint:{}", ctx.project.name),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
