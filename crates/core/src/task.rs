// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task descriptors shared by the router and spawn engine

use serde::{Deserialize, Serialize};

/// What a subagent is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Research,
    Planning,
    Implementation,
    Testing,
    Validation,
    Documentation,
    Fix,
    Deployment,
    Review,
    Security,
    Integration,
}

impl TaskType {
    pub const ALL: [TaskType; 11] = [
        TaskType::Research,
        TaskType::Planning,
        TaskType::Implementation,
        TaskType::Testing,
        TaskType::Validation,
        TaskType::Documentation,
        TaskType::Fix,
        TaskType::Deployment,
        TaskType::Review,
        TaskType::Security,
        TaskType::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Planning => "planning",
            TaskType::Implementation => "implementation",
            TaskType::Testing => "testing",
            TaskType::Validation => "validation",
            TaskType::Documentation => "documentation",
            TaskType::Fix => "fix",
            TaskType::Deployment => "deployment",
            TaskType::Review => "review",
            TaskType::Security => "security",
            TaskType::Integration => "integration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied complexity hint for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityHint {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityHint {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(ComplexityHint::Simple),
            "moderate" => Some(ComplexityHint::Moderate),
            "complex" => Some(ComplexityHint::Complex),
            _ => None,
        }
    }
}

/// Backend AI CLI service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Claude,
    Gemini,
    Codex,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Claude, Service::Gemini, Service::Codex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Claude => "claude",
            Service::Gemini => "gemini",
            Service::Codex => "codex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
