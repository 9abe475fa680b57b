// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Backend CLI adapters.
//!
//! One adapter per AI CLI (claude / gemini / codex) behind a uniform
//! [`CliAdapter`] trait: run an instruction file in a working directory,
//! capture output to files, and probe quota availability.

pub mod cli;
pub mod quota;
pub mod subprocess;

pub use cli::{
    AdapterError, AdapterSet, ClaudeCliAdapter, CliAdapter, CodexCliAdapter, GeminiCliAdapter,
    QuotaStatus, RunOutput, RunRequest,
};

#[cfg(any(test, feature = "test-support"))]
pub use cli::{FakeCliAdapter, FakeRun, RecordedRun};
