// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template library.
//!
//! Templates are keyed by task type plus keywords. Selection scores every
//! template of the requested task type on keyword overlap with the task
//! description; ties break lexicographically by template id so the outcome
//! is reproducible.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use sup_core::{ErrorKind, TaskType};
use thiserror::Error;

/// Regex pattern for {{PLACEHOLDER}} substitution targets.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z0-9_]+)\}\}").expect("constant regex pattern is valid"));

/// Errors from template selection and rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template for task type {0}")]
    NotFound(TaskType),
    #[error("template {template}: unresolved placeholder {placeholder}")]
    Render {
        template: String,
        placeholder: String,
    },
}

impl TemplateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::NotFound(_) => ErrorKind::TemplateNotFound,
            TemplateError::Render { .. } => ErrorKind::TemplateRender,
        }
    }
}

/// A parameterized prompt template.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub task_type: TaskType,
    pub keywords: Vec<String>,
    pub body: String,
}

impl Template {
    pub fn new(
        id: impl Into<String>,
        task_type: TaskType,
        keywords: &[&str],
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            body: body.into(),
        }
    }

    /// Number of this template's keywords appearing in `description`
    /// (case-insensitive containment).
    fn keyword_overlap(&self, description: &str) -> usize {
        let haystack = description.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .count()
    }
}

/// The set of registered templates.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// The built-in template set: at least one template per task type, plus
    /// specialized variants for epic steps and criterion validation.
    pub fn builtin() -> Self {
        let body = |extra: &str| format!("{COMMON_HEADER}\n{extra}");
        let templates = vec![
            Template::new(
                "deployment-default",
                TaskType::Deployment,
                &["deploy", "release", "rollout"],
                body(
                    "Execute the deployment steps for this project. Stop and report\n\
                     rather than improvise if a step fails.",
                ),
            ),
            Template::new(
                "documentation-default",
                TaskType::Documentation,
                &["document", "readme", "docs"],
                body(
                    "Write or update documentation for the area described above.\n\
                     Match the project's existing documentation tone and structure.",
                ),
            ),
            Template::new(
                "fix-default",
                TaskType::Fix,
                &["fix", "bug", "regression"],
                body(
                    "Reproduce the defect first, then fix it with the smallest change\n\
                     that makes the reproduction pass. Add a regression test.",
                ),
            ),
            Template::new(
                "implementation-default",
                TaskType::Implementation,
                &["implement", "build", "create"],
                body(
                    "Implement the task described above inside the working directory.\n\
                     Make the smallest change that satisfies the requirement, keep the\n\
                     existing style, and run the project's tests if they exist.",
                ),
            ),
            Template::new(
                "implementation-epic-step",
                TaskType::Implementation,
                &["epic", "step", "task"],
                body(
                    "You are executing one step of a larger epic.\n\n\
                     Current step: {{CURRENT_TASK}}\n\n\
                     Steps already completed:\n{{COMPLETED_TASKS}}\n\n\
                     Implement only the current step. Do not start later steps; they\n\
                     will be dispatched separately once this one lands.",
                ),
            ),
            Template::new(
                "integration-default",
                TaskType::Integration,
                &["integrate", "wire", "connect"],
                body(
                    "Wire the components described above together. Prefer existing\n\
                     seams; add adapters rather than modifying stable interfaces.",
                ),
            ),
            Template::new(
                "planning-default",
                TaskType::Planning,
                &["plan", "design", "milestones"],
                body(
                    "Produce an ordered implementation plan: numbered steps, each small\n\
                     enough for a single focused change, with acceptance criteria.",
                ),
            ),
            Template::new(
                "research-default",
                TaskType::Research,
                &["research", "investigate", "explore"],
                body(
                    "Investigate the question above against the working directory.\n\
                     Summarize findings as a short report with file references.",
                ),
            ),
            Template::new(
                "review-default",
                TaskType::Review,
                &["review", "critique"],
                body(
                    "Review the change described above for correctness and style.\n\
                     Report findings ordered by severity with file and line references.",
                ),
            ),
            Template::new(
                "security-default",
                TaskType::Security,
                &["security", "audit", "vulnerability"],
                body(
                    "Audit the area described above for security issues: injection,\n\
                     secrets in code, permission gaps. Report findings with severity\n\
                     and location.",
                ),
            ),
            Template::new(
                "testing-default",
                TaskType::Testing,
                &["test", "coverage"],
                body(
                    "Run the project's test suite, report failures with file and line,\n\
                     and fix flaky or missing coverage only when the task asks for it.",
                ),
            ),
            Template::new(
                "validation-criterion",
                TaskType::Validation,
                &["criterion", "verify", "acceptance"],
                body(
                    "You are validating a single acceptance criterion.\n\n\
                     Criterion ({{CRITERION_SECTION}}): {{CRITERION}}\n\n\
                     Inspect the working directory and decide whether the criterion is\n\
                     met. Finish your output with exactly one line of the form:\n\n\
                     VERDICT: {\"met\": true, \"evidence\": \"...\"}",
                ),
            ),
        ];
        Self::new(templates)
    }

    /// Register an additional template (e.g. a host-provided collaborator
    /// prompt).
    pub fn register(&mut self, template: Template) {
        self.templates.push(template);
    }

    /// Pick the best template for a task.
    ///
    /// Candidates are templates of the same task type; the highest keyword
    /// overlap wins and ties go to the lexicographically smallest id.
    pub fn select(
        &self,
        task_type: TaskType,
        description: &str,
    ) -> Result<&Template, TemplateError> {
        self.templates
            .iter()
            .filter(|t| t.task_type == task_type)
            .map(|t| (t.keyword_overlap(description), t))
            .max_by(|(score_a, a), (score_b, b)| {
                // Higher score wins; on equal score the smaller id must win,
                // so the id comparison is reversed for max_by.
                score_a.cmp(score_b).then_with(|| b.id.cmp(&a.id))
            })
            .map(|(_, t)| t)
            .ok_or(TemplateError::NotFound(task_type))
    }

    /// Substitute `{{NAME}}` placeholders. Every placeholder in the body
    /// must be present in `vars`.
    pub fn render(
        &self,
        template: &Template,
        vars: &HashMap<String, String>,
    ) -> Result<String, TemplateError> {
        let mut missing: Option<String> = None;
        let rendered = PLACEHOLDER_PATTERN
            .replace_all(&template.body, |caps: &regex::Captures| {
                let name = &caps[1];
                match vars.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        if missing.is_none() {
                            missing = Some(name.to_string());
                        }
                        String::new()
                    }
                }
            })
            .to_string();
        if let Some(placeholder) = missing {
            return Err(TemplateError::Render {
                template: template.id.clone(),
                placeholder,
            });
        }
        Ok(rendered)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

const COMMON_HEADER: &str = "\
# Subagent instructions

Project: {{PROJECT_NAME}}
Working directory: {{PROJECT_PATH}}

Task: {{TASK_DESCRIPTION}}

Context:
```json
{{CONTEXT_JSON}}
```
";

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
