// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code CLI adapter.

use crate::cli::{AdapterError, CliAdapter, QuotaStatus, RunOutput, RunRequest};
use crate::{quota, subprocess};
use async_trait::async_trait;
use std::path::PathBuf;
use sup_core::Service;
use tokio::process::Command;
use tracing::info;

/// Adapter for the `claude` CLI.
///
/// Runs headless (`-p`) with the prompt on stdin; the model is pinned per
/// request by the router.
#[derive(Clone)]
pub struct ClaudeCliAdapter {
    binary: PathBuf,
    quota_file: Option<PathBuf>,
}

impl ClaudeCliAdapter {
    pub fn new(quota_file: Option<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("claude"),
            quota_file,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn build_command(&self, req: &RunRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-p", "--model", &req.model]);
        cmd
    }
}

#[async_trait]
impl CliAdapter for ClaudeCliAdapter {
    fn service(&self) -> Service {
        Service::Claude
    }

    async fn run(&self, req: RunRequest) -> Result<RunOutput, AdapterError> {
        info!(model = %req.model, cwd = %req.cwd.display(), "running claude");
        let cmd = self.build_command(&req);
        subprocess::run_to_files(cmd, &req, "claude").await
    }

    async fn check_quota(&self) -> QuotaStatus {
        quota::probe_file(self.quota_file.as_deref())
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
