// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake adapter for tests.
//!
//! Records every run (including the instruction file contents and cwd) and
//! replays scripted outcomes. A scripted delay longer than the request
//! deadline simulates a hung agent without actually sleeping that long.

use crate::cli::{AdapterError, CliAdapter, QuotaStatus, RunOutput, RunRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sup_core::Service;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub exit_code: i32,
    pub stdout: String,
    /// Simulated wall time; compared against the request deadline
    pub delay: Option<Duration>,
}

impl Default for FakeRun {
    fn default() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            delay: None,
        }
    }
}

impl FakeRun {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn failing(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            delay: None,
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

/// A recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub instructions: String,
    pub cwd: PathBuf,
    pub model: String,
    pub deadline: Option<Duration>,
}

/// Fake [`CliAdapter`] with scripted outcomes and call recording.
#[derive(Clone)]
pub struct FakeCliAdapter {
    service: Service,
    calls: Arc<Mutex<Vec<RecordedRun>>>,
    script: Arc<Mutex<VecDeque<FakeRun>>>,
    quota: Arc<Mutex<QuotaStatus>>,
}

impl FakeCliAdapter {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            quota: Arc::new(Mutex::new(QuotaStatus::available())),
        }
    }

    /// Queue the next scripted outcome. Unscripted runs succeed with empty
    /// output.
    pub fn push_run(&self, run: FakeRun) {
        self.script.lock().push_back(run);
    }

    pub fn set_quota(&self, status: QuotaStatus) {
        *self.quota.lock() = status;
    }

    pub fn calls(&self) -> Vec<RecordedRun> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CliAdapter for FakeCliAdapter {
    fn service(&self) -> Service {
        self.service
    }

    async fn run(&self, req: RunRequest) -> Result<RunOutput, AdapterError> {
        let instructions = std::fs::read_to_string(&req.instructions_path)?;
        self.calls.lock().push(RecordedRun {
            instructions,
            cwd: req.cwd.clone(),
            model: req.model.clone(),
            deadline: req.deadline,
        });

        let run = self.script.lock().pop_front().unwrap_or_default();
        if let (Some(deadline), Some(delay)) = (req.deadline, run.delay) {
            if delay > deadline {
                // Hung agent: nothing useful reaches the output file
                std::fs::write(&req.stdout_path, "")?;
                std::fs::write(&req.stderr_path, "")?;
                return Err(AdapterError::Timeout { after: deadline });
            }
        }
        if let Some(delay) = run.delay {
            tokio::time::sleep(delay).await;
        }

        std::fs::write(&req.stdout_path, run.stdout.as_bytes())?;
        std::fs::write(&req.stderr_path, "")?;
        Ok(RunOutput {
            stdout_path: req.stdout_path,
            stderr_path: req.stderr_path,
            exit_code: run.exit_code,
            duration_ms: run.delay.map(|d| d.as_millis() as u64).unwrap_or(1),
        })
    }

    async fn check_quota(&self) -> QuotaStatus {
        self.quota.lock().clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
