// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subagent spawning.
//!
//! One spawn = route → render template → write instruction file → record the
//! ActiveSpawn row → run the CLI adapter in the project working directory →
//! record outcome, events, and a command-audit row. The engine never retries;
//! retry policy belongs to the orchestrator or the caller so side effects
//! stay attributable.

use crate::error::EngineError;
use crate::limits::SpawnLimits;
use crate::router::{self, TaskDescriptor};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sup_adapters::{AdapterError, AdapterSet, RunRequest};
use sup_core::{
    AgentId, Clock, CommandEntry, ComplexityHint, ErrorKind, EventType, IdGen, InstanceId,
    Project, Service, TaskType,
};
use sup_epic::TemplateLibrary;
use sup_storage::{EventStore, SpawnRecord, SpawnStatus, SpawnStore};
use tracing::{error, info, warn};

/// Parameters for one subagent spawn.
#[derive(Debug, Clone)]
pub struct SpawnParams {
    pub task_type: TaskType,
    /// Free text driving routing and template selection
    pub description: String,
    /// Open context map (`project_path`, `project_name`, `epic_file`,
    /// `current_task`, …)
    pub context: Map<String, Value>,
    pub complexity_hint: Option<ComplexityHint>,
    pub estimated_tokens: Option<u64>,
    /// Deadline for the CLI process (set by the orchestrator per phase)
    pub deadline: Option<Duration>,
}

/// Who asked for the spawn.
///
/// The project comes from the MCP endpoint the tool was invoked on; the
/// instance is the caller's supervisor session when it supplied one.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub instance_id: Option<InstanceId>,
    pub project: Option<Arc<Project>>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Same caller without the instance attribution.
    pub fn without_instance(&self) -> Self {
        Self {
            instance_id: None,
            project: self.project.clone(),
        }
    }
}

/// Failure detail carried inside a [`SpawnOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpawnFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of a spawn that made it to execution.
///
/// Pre-flight failures (validation, missing project context, exhausted
/// quota, missing template) return `Err(EngineError)` instead and leave no
/// instruction file and no ActiveSpawn row behind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpawnOutcome {
    pub success: bool,
    pub agent_id: AgentId,
    pub service: Service,
    pub model: String,
    pub duration_ms: u64,
    pub cost_estimate_usd: f64,
    pub output_path: PathBuf,
    pub exit_code: Option<i32>,
    pub error: Option<SpawnFailure>,
}

/// Orchestrates Router → Template → CLI adapter → logs for one spawn.
#[derive(Clone)]
pub struct SpawnEngine<C: Clock, G: IdGen> {
    events: EventStore<C>,
    spawns: SpawnStore<C>,
    adapters: AdapterSet,
    templates: Arc<TemplateLibrary>,
    limits: Arc<SpawnLimits>,
    clock: C,
    id_gen: G,
    /// Directory for instruction and output files
    work_dir: PathBuf,
}

impl<C: Clock, G: IdGen> SpawnEngine<C, G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: EventStore<C>,
        spawns: SpawnStore<C>,
        adapters: AdapterSet,
        templates: Arc<TemplateLibrary>,
        limits: Arc<SpawnLimits>,
        clock: C,
        id_gen: G,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            events,
            spawns,
            adapters,
            templates,
            limits,
            clock,
            id_gen,
            work_dir,
        }
    }

    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// Spawn one subagent and wait for it.
    pub async fn spawn_subagent(
        &self,
        params: SpawnParams,
        caller: &CallerContext,
    ) -> Result<SpawnOutcome, EngineError> {
        if params.description.trim().is_empty() {
            let err = EngineError::Validation("description must not be empty".to_string());
            self.record_preflight_failure(&params, caller, &err, 0);
            return Err(err);
        }

        // Working directory resolution is strict: explicit context, then the
        // endpoint project. Never the supervisor's own cwd.
        let project_path = match self.resolve_project_path(&params, caller) {
            Ok(path) => path,
            Err(err) => {
                self.record_preflight_failure(&params, caller, &err, 0);
                return Err(err);
            }
        };
        let project_name = params
            .context
            .get("project_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| basename(&project_path));

        let descriptor = TaskDescriptor {
            task_type: params.task_type,
            complexity_hint: params.complexity_hint,
            estimated_tokens: params.estimated_tokens,
            description: params.description.clone(),
        };
        let route = match router::route(&descriptor, &self.adapters).await {
            Ok(route) => route,
            Err(err) => {
                // S6 contract: no instruction file, no spawn row, a failed
                // command entry with zero duration
                self.record_preflight_failure(&params, caller, &err, 0);
                return Err(err);
            }
        };

        let template = match self.templates.select(params.task_type, &params.description) {
            Ok(template) => template,
            Err(e) => {
                let err = EngineError::from(e);
                self.record_preflight_failure(&params, caller, &err, 0);
                return Err(err);
            }
        };
        let vars = self.template_vars(&params, &project_path.display().to_string(), &project_name)?;
        let instructions = match self.templates.render(template, &vars) {
            Ok(instructions) => instructions,
            Err(e) => {
                let err = EngineError::from(e);
                self.record_preflight_failure(&params, caller, &err, 0);
                return Err(err);
            }
        };

        let agent_id = AgentId::generate(self.clock.epoch_ms(), &self.id_gen);
        std::fs::create_dir_all(&self.work_dir)?;
        let instructions_path = self
            .work_dir
            .join(format!("agent-{agent_id}-instructions.md"));
        let output_path = self.work_dir.join(format!("agent-{agent_id}-output.log"));
        let stderr_path = self.work_dir.join(format!("agent-{agent_id}-stderr.log"));
        std::fs::write(&instructions_path, instructions)?;

        self.spawns.insert(&SpawnRecord {
            agent_id: agent_id.clone(),
            instance_id: caller.instance_id.clone(),
            project_path: project_path.clone(),
            task_type: params.task_type,
            description: params.description.clone(),
            service: route.service,
            model: route.model.clone(),
            status: SpawnStatus::Running,
            output_path: output_path.clone(),
            exit_code: None,
            error: None,
            started_at_epoch_ms: self.clock.epoch_ms(),
            ended_at_epoch_ms: None,
        })?;

        info!(
            agent_id = %agent_id,
            service = %route.service,
            model = %route.model,
            template = %template.id,
            cwd = %project_path.display(),
            "spawning subagent"
        );
        self.emit_phase_start(caller, &agent_id, params.task_type);

        let adapter = self.adapters.get(route.service).ok_or_else(|| {
            EngineError::Internal(format!("router chose unconfigured service {}", route.service))
        })?;
        let run_request = RunRequest {
            instructions_path,
            cwd: project_path,
            model: route.model.clone(),
            stdout_path: output_path.clone(),
            stderr_path,
            deadline: params.deadline,
        };

        let run_result = {
            let _permit = self.limits.acquire_cli().await?;
            adapter.run(run_request).await
        };

        let outcome = match run_result {
            Ok(run) => {
                let success = run.exit_code == 0;
                let status = if success {
                    SpawnStatus::Completed
                } else {
                    SpawnStatus::Failed
                };
                self.spawns
                    .finish(&agent_id, status, Some(run.exit_code), None)?;
                SpawnOutcome {
                    success,
                    agent_id: agent_id.clone(),
                    service: route.service,
                    model: route.model.clone(),
                    duration_ms: run.duration_ms,
                    cost_estimate_usd: route.estimated_cost_usd,
                    output_path: output_path.clone(),
                    exit_code: Some(run.exit_code),
                    error: (!success).then(|| SpawnFailure {
                        kind: ErrorKind::AdapterExit,
                        message: format!("adapter exited with code {}", run.exit_code),
                    }),
                }
            }
            Err(AdapterError::Timeout { after }) => {
                warn!(agent_id = %agent_id, "spawn deadline expired");
                self.spawns.finish(
                    &agent_id,
                    SpawnStatus::Stalled,
                    None,
                    Some("deadline expired"),
                )?;
                SpawnOutcome {
                    success: false,
                    agent_id: agent_id.clone(),
                    service: route.service,
                    model: route.model.clone(),
                    duration_ms: after.as_millis() as u64,
                    cost_estimate_usd: route.estimated_cost_usd,
                    output_path: output_path.clone(),
                    exit_code: None,
                    error: Some(SpawnFailure {
                        kind: ErrorKind::Timeout,
                        message: format!("deadline expired after {after:?}"),
                    }),
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.spawns
                    .finish(&agent_id, SpawnStatus::Failed, None, Some(&message))?;
                SpawnOutcome {
                    success: false,
                    agent_id: agent_id.clone(),
                    service: route.service,
                    model: route.model.clone(),
                    duration_ms: 0,
                    cost_estimate_usd: route.estimated_cost_usd,
                    output_path: output_path.clone(),
                    exit_code: None,
                    error: Some(SpawnFailure {
                        kind: e.kind(),
                        message,
                    }),
                }
            }
        };

        self.record_outcome(&params, caller, &outcome);
        Ok(outcome)
    }

    fn resolve_project_path(
        &self,
        params: &SpawnParams,
        caller: &CallerContext,
    ) -> Result<PathBuf, EngineError> {
        if let Some(value) = params.context.get("project_path") {
            let path = value.as_str().ok_or_else(|| {
                EngineError::Validation("context.project_path must be a string".to_string())
            })?;
            let path = PathBuf::from(path);
            if !path.is_absolute() {
                return Err(EngineError::Validation(format!(
                    "context.project_path must be absolute: {}",
                    path.display()
                )));
            }
            return Ok(path);
        }
        if let Some(project) = &caller.project {
            return Ok(project.path.clone());
        }
        Err(EngineError::NoProjectContext)
    }

    fn template_vars(
        &self,
        params: &SpawnParams,
        project_path: &str,
        project_name: &str,
    ) -> Result<HashMap<String, String>, EngineError> {
        let context_json = serde_json::to_string_pretty(&Value::Object(params.context.clone()))?;
        let str_of = |key: &str| {
            params
                .context
                .get(key)
                .map(value_to_string)
                .unwrap_or_default()
        };
        let completed = match params.context.get("completed_tasks") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|v| format!("- {}", value_to_string(v)))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "(none)".to_string(),
        };

        let mut vars = HashMap::new();
        vars.insert("TASK_DESCRIPTION".into(), params.description.clone());
        vars.insert("PROJECT_PATH".into(), project_path.to_string());
        vars.insert("PROJECT_NAME".into(), project_name.to_string());
        vars.insert("CONTEXT_JSON".into(), context_json);
        vars.insert("CURRENT_TASK".into(), str_of("current_task"));
        vars.insert("COMPLETED_TASKS".into(), completed);
        vars.insert("CRITERION".into(), str_of("criterion"));
        vars.insert("CRITERION_SECTION".into(), str_of("criterion_section"));
        vars.insert("EPIC_FILE".into(), str_of("epic_file"));
        Ok(vars)
    }

    /// Task-type specific start events (deployments and test runs have
    /// dedicated lifecycle events in the stream).
    fn emit_phase_start(&self, caller: &CallerContext, agent_id: &AgentId, task_type: TaskType) {
        let event_type = match task_type {
            TaskType::Deployment => EventType::DeploymentStarted,
            TaskType::Testing => EventType::TestStarted,
            _ => return,
        };
        self.emit(caller, event_type, json!({ "agent_id": agent_id }));
    }

    fn record_outcome(&self, params: &SpawnParams, caller: &CallerContext, outcome: &SpawnOutcome) {
        self.emit(
            caller,
            EventType::TaskSpawned,
            json!({
                "agent_id": outcome.agent_id,
                "task_type": params.task_type.as_str(),
                "service": outcome.service.as_str(),
                "model": outcome.model,
                "success": outcome.success,
                "duration_ms": outcome.duration_ms,
                "cost_estimate_usd": outcome.cost_estimate_usd,
                "exit_code": outcome.exit_code,
                "error": outcome.error.as_ref().map(|e| e.kind.as_str()),
            }),
        );
        let follow_up = match (params.task_type, outcome.success) {
            (TaskType::Testing, true) => Some(EventType::TestPassed),
            (TaskType::Testing, false) => Some(EventType::TestFailed),
            (TaskType::Deployment, true) => Some(EventType::DeploymentCompleted),
            (TaskType::Deployment, false) => Some(EventType::DeploymentFailed),
            _ => None,
        };
        if let Some(event_type) = follow_up {
            self.emit(caller, event_type, json!({ "agent_id": outcome.agent_id }));
        }

        let mut entry = CommandEntry {
            command_type: "spawn".to_string(),
            action: "spawn_subagent".to_string(),
            tool_name: Some("spawn_subagent".to_string()),
            parameters: json!({
                "task_type": params.task_type.as_str(),
                "description": params.description,
            }),
            result: Some(json!({
                "agent_id": outcome.agent_id,
                "service": outcome.service.as_str(),
                "model": outcome.model,
                "exit_code": outcome.exit_code,
                "cost_estimate_usd": outcome.cost_estimate_usd,
            })),
            success: outcome.success,
            error_message: outcome.error.as_ref().map(|e| e.message.clone()),
            execution_time_ms: Some(outcome.duration_ms),
            tags: vec!["spawn".to_string(), params.task_type.as_str().to_string()],
        };
        if !outcome.success {
            entry.tags.push("failed".to_string());
        }
        if let Err(e) = self.events.log_command(caller.instance_id.as_ref(), entry) {
            error!(error = %e, "failed to record spawn command entry");
        }
    }

    /// Record a failure that stopped the spawn before anything was written.
    fn record_preflight_failure(
        &self,
        params: &SpawnParams,
        caller: &CallerContext,
        err: &EngineError,
        duration_ms: u64,
    ) {
        self.emit(
            caller,
            EventType::TaskSpawned,
            json!({
                "task_type": params.task_type.as_str(),
                "success": false,
                "error": err.kind().as_str(),
            }),
        );
        let entry = CommandEntry {
            command_type: "spawn".to_string(),
            action: "spawn_subagent".to_string(),
            tool_name: Some("spawn_subagent".to_string()),
            parameters: json!({
                "task_type": params.task_type.as_str(),
                "description": params.description,
            }),
            result: None,
            success: false,
            error_message: Some(err.to_string()),
            execution_time_ms: Some(duration_ms),
            tags: vec![
                "spawn".to_string(),
                "failed".to_string(),
                err.kind().as_str().to_string(),
            ],
        };
        if let Err(e) = self.events.log_command(caller.instance_id.as_ref(), entry) {
            error!(error = %e, "failed to record spawn failure entry");
        }
    }

    fn emit(&self, caller: &CallerContext, event_type: EventType, data: Value) {
        let Some(instance_id) = &caller.instance_id else {
            return;
        };
        if let Err(e) = self.events.append(instance_id, event_type, data, json!({})) {
            error!(error = %e, event = %event_type, "failed to append spawn event");
        }
    }
}

fn basename(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
