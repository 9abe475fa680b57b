// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cost/quota router.
//!
//! Deterministic policy: complexity signals prefer the top Claude tier,
//! context-heavy reading tasks prefer the flash Gemini tier, everything
//! else defaults to the mid Codex tier. An exhausted preference falls back
//! to the cheapest non-exhausted service; everything exhausted is a hard
//! failure.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use sup_adapters::AdapterSet;
use sup_core::{ComplexityHint, Service, TaskType};
use tracing::debug;

/// Keywords in a task description that force the complex tier.
pub const COMPLEX_KEYWORDS: [&str; 4] = ["architecture", "complex", "critical", "production"];

/// Token estimate used for cost quoting when the caller gives none.
pub const DEFAULT_ESTIMATED_TOKENS: u64 = 10_000;

/// Task facts the router decides on.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub task_type: TaskType,
    pub complexity_hint: Option<ComplexityHint>,
    pub estimated_tokens: Option<u64>,
    pub description: String,
}

/// Routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub service: Service,
    pub model: String,
    pub estimated_cost_usd: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy)]
struct ModelChoice {
    service: Service,
    model: &'static str,
    price_per_token: f64,
}

const CLAUDE_TOP: ModelChoice = ModelChoice {
    service: Service::Claude,
    model: "claude-opus-4-1",
    price_per_token: 15e-6,
};

const CLAUDE_MID: ModelChoice = ModelChoice {
    service: Service::Claude,
    model: "claude-sonnet-4-5",
    price_per_token: 3e-6,
};

const GEMINI_FLASH: ModelChoice = ModelChoice {
    service: Service::Gemini,
    model: "gemini-2.5-flash",
    price_per_token: 0.3e-6,
};

const CODEX_MID: ModelChoice = ModelChoice {
    service: Service::Codex,
    model: "gpt-5-codex",
    price_per_token: 1.25e-6,
};

/// Fallback candidates, cheapest first, one per service.
const FALLBACK_ORDER: [ModelChoice; 3] = [GEMINI_FLASH, CODEX_MID, CLAUDE_MID];

/// Pick `{service, model}` and quote the estimated cost for a task.
pub async fn route(task: &TaskDescriptor, adapters: &AdapterSet) -> Result<Route, EngineError> {
    let (preferred, reasoning) = preferred_choice(task);

    let quota = adapters.quota(preferred.service).await;
    if quota.available {
        debug!(service = %preferred.service, model = preferred.model, "routing to preference");
        return Ok(build_route(preferred, task, reasoning));
    }

    // Preference exhausted: cheapest non-exhausted service wins
    let mut reasons = vec![format!(
        "{}: {}",
        preferred.service,
        quota.reason.unwrap_or_else(|| "exhausted".to_string())
    )];
    for choice in FALLBACK_ORDER {
        if choice.service == preferred.service {
            continue;
        }
        let quota = adapters.quota(choice.service).await;
        if quota.available {
            let reasoning = format!(
                "{reasoning}; {} exhausted, falling back to cheapest available ({})",
                preferred.service, choice.service
            );
            debug!(service = %choice.service, model = choice.model, "routing to fallback");
            return Ok(build_route(choice, task, reasoning));
        }
        reasons.push(format!(
            "{}: {}",
            choice.service,
            quota.reason.unwrap_or_else(|| "exhausted".to_string())
        ));
    }

    Err(EngineError::QuotaExhausted(reasons.join("; ")))
}

fn preferred_choice(task: &TaskDescriptor) -> (ModelChoice, String) {
    if task.complexity_hint == Some(ComplexityHint::Complex) {
        return (
            CLAUDE_TOP,
            "complexity hint is complex; top tier".to_string(),
        );
    }
    let description = task.description.to_lowercase();
    if let Some(keyword) = COMPLEX_KEYWORDS
        .iter()
        .find(|k| description.contains(*k))
    {
        return (
            CLAUDE_TOP,
            format!("description mentions {keyword:?}; top tier"),
        );
    }
    if matches!(
        task.task_type,
        TaskType::Research | TaskType::Documentation | TaskType::Planning
    ) {
        return (
            GEMINI_FLASH,
            format!("{} task; cheapest large-context tier", task.task_type),
        );
    }
    (CODEX_MID, "default mid tier".to_string())
}

fn build_route(choice: ModelChoice, task: &TaskDescriptor, reasoning: String) -> Route {
    let tokens = task.estimated_tokens.unwrap_or(DEFAULT_ESTIMATED_TOKENS);
    Route {
        service: choice.service,
        model: choice.model.to_string(),
        estimated_cost_usd: round4(choice.price_per_token * tokens as f64),
        reasoning,
    }
}

/// Accounting cost is quoted to 4 decimal places.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
