// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini CLI adapter.

use crate::cli::{AdapterError, CliAdapter, QuotaStatus, RunOutput, RunRequest};
use crate::{quota, subprocess};
use async_trait::async_trait;
use std::path::PathBuf;
use sup_core::Service;
use tokio::process::Command;
use tracing::info;

/// Adapter for the `gemini` CLI (non-interactive, prompt on stdin).
#[derive(Clone)]
pub struct GeminiCliAdapter {
    binary: PathBuf,
    quota_file: Option<PathBuf>,
}

impl GeminiCliAdapter {
    pub fn new(quota_file: Option<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("gemini"),
            quota_file,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn build_command(&self, req: &RunRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--model", &req.model]);
        cmd
    }
}

#[async_trait]
impl CliAdapter for GeminiCliAdapter {
    fn service(&self) -> Service {
        Service::Gemini
    }

    async fn run(&self, req: RunRequest) -> Result<RunOutput, AdapterError> {
        info!(model = %req.model, cwd = %req.cwd.display(), "running gemini");
        let cmd = self.build_command(&req);
        subprocess::run_to_files(cmd, &req, "gemini").await
    }

    async fn check_quota(&self) -> QuotaStatus {
        quota::probe_file(self.quota_file.as_deref())
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
