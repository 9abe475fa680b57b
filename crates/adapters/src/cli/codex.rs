// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex CLI adapter.

use crate::cli::{AdapterError, CliAdapter, QuotaStatus, RunOutput, RunRequest};
use crate::{quota, subprocess};
use async_trait::async_trait;
use std::path::PathBuf;
use sup_core::Service;
use tokio::process::Command;
use tracing::info;

/// Adapter for the `codex` CLI (`codex exec`, prompt on stdin).
#[derive(Clone)]
pub struct CodexCliAdapter {
    binary: PathBuf,
    quota_file: Option<PathBuf>,
}

impl CodexCliAdapter {
    pub fn new(quota_file: Option<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("codex"),
            quota_file,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn build_command(&self, req: &RunRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["exec", "--model", &req.model]);
        cmd
    }
}

#[async_trait]
impl CliAdapter for CodexCliAdapter {
    fn service(&self) -> Service {
        Service::Codex
    }

    async fn run(&self, req: RunRequest) -> Result<RunOutput, AdapterError> {
        info!(model = %req.model, cwd = %req.cwd.display(), "running codex");
        let cmd = self.build_command(&req);
        subprocess::run_to_files(cmd, &req, "codex").await
    }

    async fn check_quota(&self) -> QuotaStatus {
        quota::probe_file(self.quota_file.as_deref())
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
