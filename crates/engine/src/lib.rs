// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Engine: routing, subagent spawning, epic orchestration, health sweeps.

mod error;
mod health;
mod limits;
mod orchestrator;
mod pr;
mod router;
mod spawn;

pub use error::EngineError;
pub use health::{HealthSweeper, SweepReport, DEFAULT_SPAWN_MAX_AGE, SWEEP_INTERVAL};
pub use limits::{SpawnLimits, DEFAULT_CLI_PROCESSES, DEFAULT_VALIDATION_CONCURRENCY};
pub use orchestrator::{
    CriteriaValidation, CriterionResult, EpicOutcome, EpicRequest, Orchestrator, PhaseOutcome,
    DEFAULT_PHASE_DEADLINE,
};
pub use pr::{GhPrOpener, NoopPrOpener, PrError, PrOpener};
pub use router::{route, Route, TaskDescriptor, COMPLEX_KEYWORDS, DEFAULT_ESTIMATED_TOKENS};
pub use spawn::{CallerContext, SpawnEngine, SpawnFailure, SpawnOutcome, SpawnParams};

#[cfg(any(test, feature = "test-support"))]
pub use pr::FakePrOpener;
