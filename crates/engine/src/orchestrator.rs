// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic execution orchestrator.
//!
//! State machine per epic: LOADED → IMPLEMENTING (task i) → VALIDATING →
//! DONE, failing out with `(phase, task_index, reason)`. Implementation
//! spawns run strictly in order with a per-phase deadline; validation spawns
//! run concurrently under a bounded cap and are all collected before the
//! terminal verdict. Failures never raise past this module; callers get a
//! structured outcome.

use crate::error::EngineError;
use crate::limits::DEFAULT_VALIDATION_CONCURRENCY;
use crate::pr::PrOpener;
use crate::spawn::{CallerContext, SpawnEngine, SpawnParams};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sup_core::{AgentId, Clock, ErrorKind, EventType, IdGen, TaskType};
use sup_epic::{parse_epic, Epic};
use sup_storage::EventStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default wall-clock budget for one implementation or validation phase.
pub const DEFAULT_PHASE_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Request to execute an epic against a project tree.
#[derive(Debug, Clone)]
pub struct EpicRequest {
    pub project_name: Option<String>,
    pub project_path: Option<PathBuf>,
    pub epic_file: PathBuf,
    pub create_pr: bool,
}

/// Verdict for one acceptance criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: String,
    pub section: String,
    pub met: bool,
    pub evidence: String,
}

/// Collected validation phase results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaValidation {
    pub all_met: bool,
    pub results: Vec<CriterionResult>,
}

/// Terminal outcome of an epic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub tasks_completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_validation: Option<CriteriaValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
}

impl EpicOutcome {
    fn failed(phase: &str, task_index: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            phase: Some(phase.to_string()),
            task_index,
            reason: Some(reason.into()),
            tasks_completed: 0,
            criteria_validation: None,
            pr_url: None,
        }
    }
}

/// Outcome of one standalone phase entry point (`run_prime` / `run_plan`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub success: bool,
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    met: bool,
    #[serde(default)]
    evidence: String,
}

/// Per-phase planner over the spawn engine.
pub struct Orchestrator<C: Clock, G: IdGen> {
    engine: Arc<SpawnEngine<C, G>>,
    events: EventStore<C>,
    pr: Arc<dyn PrOpener>,
    phase_deadline: Duration,
    validation_concurrency: usize,
}

impl<C: Clock, G: IdGen> Orchestrator<C, G> {
    pub fn new(engine: Arc<SpawnEngine<C, G>>, events: EventStore<C>, pr: Arc<dyn PrOpener>) -> Self {
        Self {
            engine,
            events,
            pr,
            phase_deadline: DEFAULT_PHASE_DEADLINE,
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
        }
    }

    pub fn with_phase_deadline(mut self, deadline: Duration) -> Self {
        self.phase_deadline = deadline;
        self
    }

    pub fn with_validation_concurrency(mut self, cap: usize) -> Self {
        self.validation_concurrency = cap.max(1);
        self
    }

    /// Run the full epic: every implementation note in order, then every
    /// acceptance criterion.
    pub async fn implement_epic(
        &self,
        req: &EpicRequest,
        caller: &CallerContext,
    ) -> Result<EpicOutcome, EngineError> {
        self.run_from(req, Vec::new(), caller).await
    }

    /// Restart the execute phase with prior steps already done.
    ///
    /// `completed_tasks` carries the notes finished by earlier runs; only the
    /// remaining notes are spawned, then validation proceeds as usual.
    pub async fn run_execute(
        &self,
        req: &EpicRequest,
        completed_tasks: Vec<String>,
        caller: &CallerContext,
    ) -> Result<EpicOutcome, EngineError> {
        self.run_from(req, completed_tasks, caller).await
    }

    /// One-shot prime phase: a research spawn over the epic document.
    pub async fn run_prime(
        &self,
        req: &EpicRequest,
        caller: &CallerContext,
    ) -> Result<PhaseOutcome, EngineError> {
        self.run_single_phase(
            req,
            caller,
            "prime",
            TaskType::Research,
            EventType::EpicStarted,
            format!(
                "Research the epic at {} and prime context for implementation",
                req.epic_file.display()
            ),
        )
        .await
    }

    /// One-shot plan phase: a planning spawn over the epic document.
    pub async fn run_plan(
        &self,
        req: &EpicRequest,
        caller: &CallerContext,
    ) -> Result<PhaseOutcome, EngineError> {
        self.run_single_phase(
            req,
            caller,
            "plan",
            TaskType::Planning,
            EventType::EpicPlanned,
            format!(
                "Plan the implementation of the epic at {}",
                req.epic_file.display()
            ),
        )
        .await
    }

    async fn run_single_phase(
        &self,
        req: &EpicRequest,
        caller: &CallerContext,
        phase: &str,
        task_type: TaskType,
        milestone: EventType,
        description: String,
    ) -> Result<PhaseOutcome, EngineError> {
        let content = match std::fs::read_to_string(&req.epic_file) {
            Ok(content) => content,
            Err(e) => {
                return Ok(PhaseOutcome {
                    success: false,
                    phase: phase.to_string(),
                    reason: Some(format!("cannot read epic file: {e}")),
                    agent_id: None,
                })
            }
        };
        self.emit(caller, milestone, json!({ "epic_file": req.epic_file }));

        let mut context = self.base_context(req);
        context.insert("epic_content".to_string(), Value::String(content));
        let params = SpawnParams {
            task_type,
            description,
            context,
            complexity_hint: None,
            estimated_tokens: None,
            deadline: Some(self.phase_deadline),
        };
        match self.engine.spawn_subagent(params, caller).await {
            Ok(outcome) if outcome.success => Ok(PhaseOutcome {
                success: true,
                phase: phase.to_string(),
                reason: None,
                agent_id: Some(outcome.agent_id),
            }),
            Ok(outcome) => Ok(PhaseOutcome {
                success: false,
                phase: phase.to_string(),
                reason: Some(failure_reason(&outcome)),
                agent_id: Some(outcome.agent_id),
            }),
            Err(e) => Ok(PhaseOutcome {
                success: false,
                phase: phase.to_string(),
                reason: Some(e.to_string()),
                agent_id: None,
            }),
        }
    }

    async fn run_from(
        &self,
        req: &EpicRequest,
        completed: Vec<String>,
        caller: &CallerContext,
    ) -> Result<EpicOutcome, EngineError> {
        let content = match std::fs::read_to_string(&req.epic_file) {
            Ok(content) => content,
            Err(e) => {
                let outcome =
                    EpicOutcome::failed("load", None, format!("cannot read epic file: {e}"));
                self.emit_epic_failed(caller, &outcome);
                return Ok(outcome);
            }
        };
        let (epic, warnings) = parse_epic(&content);
        for warning in &warnings {
            warn!(
                epic = %req.epic_file.display(),
                line = warning.line,
                "{}",
                warning.message
            );
        }

        // Zero implementation notes is a planning failure, not an empty
        // success, so nothing is spawned.
        if epic.implementation_notes.is_empty() {
            let outcome = EpicOutcome::failed("load", None, "EmptyPlan");
            self.emit_epic_failed(caller, &outcome);
            return Ok(outcome);
        }

        let mut completed = completed;
        if completed.len() > epic.implementation_notes.len() {
            let outcome = EpicOutcome::failed(
                "execute",
                None,
                format!(
                    "completed_tasks lists {} steps but the epic has {}",
                    completed.len(),
                    epic.implementation_notes.len()
                ),
            );
            self.emit_epic_failed(caller, &outcome);
            return Ok(outcome);
        }

        info!(
            epic = %req.epic_file.display(),
            tasks = epic.implementation_notes.len(),
            resuming_at = completed.len(),
            criteria = epic.acceptance_criteria.len(),
            "epic execution starting"
        );

        // IMPLEMENTING: strictly sequential, one spawn per note
        for index in completed.len()..epic.implementation_notes.len() {
            let note = &epic.implementation_notes[index];
            let outcome = self
                .spawn_implementation(req, &content, &epic, index, &completed, caller)
                .await;
            match outcome {
                Ok(outcome) if outcome.success => {
                    completed.push(note.clone());
                }
                Ok(outcome) => {
                    let reason = failure_reason(&outcome);
                    let mut failed = EpicOutcome::failed("execute", Some(index), reason);
                    failed.tasks_completed = completed.len();
                    self.emit_epic_failed(caller, &failed);
                    return Ok(failed);
                }
                Err(e) => {
                    let mut failed = EpicOutcome::failed("execute", Some(index), e.to_string());
                    failed.tasks_completed = completed.len();
                    self.emit_epic_failed(caller, &failed);
                    return Ok(failed);
                }
            }
        }

        // VALIDATING: concurrent, bounded, all results collected
        let results = self.validate_criteria(req, &epic, caller).await?;
        let all_met = results.iter().all(|r| r.met);
        let validation = CriteriaValidation {
            all_met,
            results,
        };

        if !all_met {
            let unmet: Vec<&str> = validation
                .results
                .iter()
                .filter(|r| !r.met)
                .map(|r| r.criterion.as_str())
                .collect();
            let outcome = EpicOutcome {
                success: false,
                phase: Some("validate".to_string()),
                task_index: None,
                reason: Some(format!("unmet criteria: {}", unmet.join("; "))),
                tasks_completed: completed.len(),
                criteria_validation: Some(validation),
                pr_url: None,
            };
            self.emit_epic_failed(caller, &outcome);
            return Ok(outcome);
        }

        // DONE
        self.emit(
            caller,
            EventType::EpicCompleted,
            json!({
                "epic_file": req.epic_file,
                "tasks_completed": completed.len(),
                "criteria": validation.results.len(),
            }),
        );

        let pr_url = if req.create_pr {
            self.open_pr(req, &epic, caller).await
        } else {
            None
        };

        Ok(EpicOutcome {
            success: true,
            phase: None,
            task_index: None,
            reason: None,
            tasks_completed: completed.len(),
            criteria_validation: Some(validation),
            pr_url,
        })
    }

    async fn spawn_implementation(
        &self,
        req: &EpicRequest,
        epic_content: &str,
        epic: &Epic,
        index: usize,
        completed: &[String],
        caller: &CallerContext,
    ) -> Result<crate::spawn::SpawnOutcome, EngineError> {
        let note = &epic.implementation_notes[index];
        let mut context = self.base_context(req);
        context.insert(
            "epic_content".to_string(),
            Value::String(epic_content.to_string()),
        );
        context.insert("current_task".to_string(), Value::String(note.clone()));
        context.insert("task_index".to_string(), json!(index));
        context.insert("completed_tasks".to_string(), json!(completed));

        let params = SpawnParams {
            task_type: TaskType::Implementation,
            description: format!("Execute epic step {}: {}", index + 1, note),
            context,
            complexity_hint: None,
            estimated_tokens: None,
            deadline: Some(self.phase_deadline),
        };
        self.engine.spawn_subagent(params, caller).await
    }

    async fn validate_criteria(
        &self,
        req: &EpicRequest,
        epic: &Epic,
        caller: &CallerContext,
    ) -> Result<Vec<CriterionResult>, EngineError> {
        let semaphore = Arc::new(Semaphore::new(self.validation_concurrency));
        let mut join_set: JoinSet<(usize, CriterionResult)> = JoinSet::new();

        for (index, criterion) in epic.acceptance_criteria.iter().cloned().enumerate() {
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            // Validation spawns are attributed through the validation events
            // below, not a second task_spawned per criterion.
            let spawn_caller = caller.without_instance();
            let mut context = self.base_context(req);
            let deadline = self.phase_deadline;

            join_set.spawn(async move {
                let unmet = |evidence: String| CriterionResult {
                    criterion: criterion.text.clone(),
                    section: criterion.section.clone(),
                    met: false,
                    evidence,
                };

                let Ok(_permit) = semaphore.acquire().await else {
                    return (index, unmet("validation scheduler closed".to_string()));
                };
                context.insert(
                    "criterion".to_string(),
                    Value::String(criterion.text.clone()),
                );
                context.insert(
                    "criterion_section".to_string(),
                    Value::String(criterion.section.clone()),
                );
                let params = SpawnParams {
                    task_type: TaskType::Validation,
                    description: format!("Verify acceptance criterion: {}", criterion.text),
                    context,
                    complexity_hint: None,
                    estimated_tokens: None,
                    deadline: Some(deadline),
                };

                let criterion_result = match engine.spawn_subagent(params, &spawn_caller).await {
                    Ok(outcome) if outcome.success => match parse_verdict(&outcome.output_path) {
                        Some(v) => CriterionResult {
                            criterion: criterion.text.clone(),
                            section: criterion.section.clone(),
                            met: v.met,
                            evidence: v.evidence,
                        },
                        None => unmet("validation agent produced no verdict".to_string()),
                    },
                    Ok(outcome) => unmet(failure_reason(&outcome)),
                    Err(e) => unmet(e.to_string()),
                };
                (index, criterion_result)
            });
        }

        let mut collected: Vec<Option<CriterionResult>> =
            vec![None; epic.acceptance_criteria.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined
                .map_err(|e| EngineError::Internal(format!("validation task panicked: {e}")))?;
            let event_type = if result.met {
                EventType::ValidationPassed
            } else {
                EventType::ValidationFailed
            };
            self.emit(
                caller,
                event_type,
                json!({
                    "criterion": result.criterion,
                    "section": result.section,
                    "met": result.met,
                    "evidence": result.evidence,
                }),
            );
            collected[index] = Some(result);
        }

        Ok(collected.into_iter().flatten().collect())
    }

    async fn open_pr(
        &self,
        req: &EpicRequest,
        epic: &Epic,
        caller: &CallerContext,
    ) -> Option<String> {
        let project_path = req
            .project_path
            .clone()
            .or_else(|| caller.project.as_ref().map(|p| p.path.clone()))?;
        let title = format!("Epic {}: {}", epic.id, epic.title);
        let body = format!(
            "Implements {} steps and satisfies {} acceptance criteria.",
            epic.implementation_notes.len(),
            epic.acceptance_criteria.len()
        );
        match self.pr.open(&project_path, &title, &body).await {
            Ok(url) => {
                self.emit(caller, EventType::PrCreated, json!({ "url": url }));
                Some(url)
            }
            Err(e) => {
                error!(error = %e, "pull request creation failed");
                None
            }
        }
    }

    fn base_context(&self, req: &EpicRequest) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert(
            "epic_file".to_string(),
            Value::String(req.epic_file.display().to_string()),
        );
        if let Some(path) = &req.project_path {
            context.insert(
                "project_path".to_string(),
                Value::String(path.display().to_string()),
            );
        }
        if let Some(name) = &req.project_name {
            context.insert("project_name".to_string(), Value::String(name.clone()));
        }
        context
    }

    fn emit_epic_failed(&self, caller: &CallerContext, outcome: &EpicOutcome) {
        self.emit(
            caller,
            EventType::EpicFailed,
            json!({
                "phase": outcome.phase,
                "task_index": outcome.task_index,
                "reason": outcome.reason,
            }),
        );
    }

    fn emit(&self, caller: &CallerContext, event_type: EventType, data: Value) {
        let Some(instance_id) = &caller.instance_id else {
            return;
        };
        if let Err(e) = self.events.append(instance_id, event_type, data, json!({})) {
            error!(error = %e, event = %event_type, "failed to append epic event");
        }
    }
}

/// Readable reason string for a failed spawn outcome. Timeouts surface as
/// the bare word so phase-restart callers can match on it.
fn failure_reason(outcome: &crate::spawn::SpawnOutcome) -> String {
    match &outcome.error {
        Some(failure) if failure.kind == ErrorKind::Timeout => "Timeout".to_string(),
        Some(failure) => failure.message.clone(),
        None => "spawn failed".to_string(),
    }
}

/// Pull the trailing `VERDICT: {...}` line out of a validation agent's
/// output log.
fn parse_verdict(output_path: &std::path::Path) -> Option<Verdict> {
    let content = std::fs::read_to_string(output_path).ok()?;
    let line = content
        .lines()
        .rev()
        .find_map(|l| l.trim().strip_prefix("VERDICT:"))?;
    serde_json::from_str(line.trim()).ok()
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
