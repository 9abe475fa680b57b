// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform interface over the backend AI CLIs.
//!
//! Selection across services is data-driven by the router, so the trait is
//! object-safe and adapters are held as `Arc<dyn CliAdapter>` in an
//! [`AdapterSet`].

mod claude;
mod codex;
mod gemini;

pub use claude::ClaudeCliAdapter;
pub use codex::CodexCliAdapter;
pub use gemini::GeminiCliAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCliAdapter, FakeRun, RecordedRun};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sup_core::{ErrorKind, Service};
use thiserror::Error;

/// Errors from adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("deadline expired after {after:?}")]
    Timeout { after: Duration },
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Io(_) | AdapterError::Spawn(_) => ErrorKind::AdapterIo,
            AdapterError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// One CLI invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Instruction file fed to the CLI on stdin (the agent's sole prompt)
    pub instructions_path: PathBuf,
    /// Working directory for the CLI process, exclusive to the spawn
    pub cwd: PathBuf,
    pub model: String,
    /// Where stdout is captured verbatim
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    /// Deadline; expiry terminates the process (SIGTERM, grace, SIGKILL)
    pub deadline: Option<Duration>,
}

/// Result of a completed CLI invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Quota probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl QuotaStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn exhausted(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Adapter over one backend AI CLI.
#[async_trait]
pub trait CliAdapter: Send + Sync {
    fn service(&self) -> Service;

    /// Run the CLI against `req.cwd` with `req.instructions_path` on stdin.
    ///
    /// Must respect the working directory and must not mutate the caller's
    /// environment. On deadline expiry the process is terminated and
    /// `Timeout` is returned.
    async fn run(&self, req: RunRequest) -> Result<RunOutput, AdapterError>;

    /// Whether this service currently has quota available.
    async fn check_quota(&self) -> QuotaStatus;
}

/// The configured adapters, one per routable service.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<Service, Arc<dyn CliAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Production set: claude, gemini, and codex, with quota probe files
    /// under `quota_dir` when given.
    pub fn production(quota_dir: Option<&Path>) -> Self {
        let quota_file = |service: Service| {
            quota_dir.map(|dir| dir.join(format!("{}.json", service.as_str())))
        };
        Self::new()
            .with(Arc::new(ClaudeCliAdapter::new(quota_file(Service::Claude))))
            .with(Arc::new(GeminiCliAdapter::new(quota_file(Service::Gemini))))
            .with(Arc::new(CodexCliAdapter::new(quota_file(Service::Codex))))
    }

    pub fn with(mut self, adapter: Arc<dyn CliAdapter>) -> Self {
        self.adapters.insert(adapter.service(), adapter);
        self
    }

    pub fn get(&self, service: Service) -> Option<Arc<dyn CliAdapter>> {
        self.adapters.get(&service).cloned()
    }

    /// Quota for a service; unconfigured services are exhausted by definition.
    pub async fn quota(&self, service: Service) -> QuotaStatus {
        match self.adapters.get(&service) {
            Some(adapter) => adapter.check_quota().await,
            None => QuotaStatus::exhausted(format!("{service} adapter not configured")),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
