// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull-request collaborator.
//!
//! The git/PR helper is an external tool; the orchestrator only needs a
//! narrow capability: open a PR for a project tree and get back a URL.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sup_core::ErrorKind;
use thiserror::Error;
use tracing::info;

/// How long a `gh pr create` invocation may take.
const PR_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from the PR collaborator
#[derive(Debug, Error)]
pub enum PrError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pr helper exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("pr helper timed out after {0:?}")]
    Timeout(Duration),
}

impl PrError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DependencyFailure
    }
}

/// Opens a pull request for a project working tree.
#[async_trait]
pub trait PrOpener: Send + Sync {
    async fn open(&self, project_path: &Path, title: &str, body: &str) -> Result<String, PrError>;
}

/// `gh pr create` backed opener.
pub struct GhPrOpener {
    binary: PathBuf,
}

impl GhPrOpener {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("gh"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl Default for GhPrOpener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrOpener for GhPrOpener {
    async fn open(&self, project_path: &Path, title: &str, body: &str) -> Result<String, PrError> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["pr", "create", "--title", title, "--body", body])
            .current_dir(project_path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(PR_TIMEOUT, cmd.output())
            .await
            .map_err(|_| PrError::Timeout(PR_TIMEOUT))??;
        if !output.status.success() {
            return Err(PrError::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(url, "pull request created");
        Ok(url)
    }
}

/// Opener for deployments without a PR flow; always reports the capability
/// as unavailable.
pub struct NoopPrOpener;

#[async_trait]
impl PrOpener for NoopPrOpener {
    async fn open(
        &self,
        _project_path: &Path,
        _title: &str,
        _body: &str,
    ) -> Result<String, PrError> {
        Err(PrError::Exit {
            code: -1,
            stderr: "pr helper not configured".to_string(),
        })
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recording fake with a scripted URL.
    #[derive(Clone, Default)]
    pub struct FakePrOpener {
        calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    }

    impl FakePrOpener {
        pub fn new() -> Self {
            Self::default()
        }

        /// `(project_path, title)` of every open() call.
        pub fn calls(&self) -> Vec<(PathBuf, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl PrOpener for FakePrOpener {
        async fn open(
            &self,
            project_path: &Path,
            title: &str,
            _body: &str,
        ) -> Result<String, PrError> {
            self.calls
                .lock()
                .push((project_path.to_path_buf(), title.to_string()));
            Ok(format!("https://example.test/pr/{}", self.calls.lock().len()))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePrOpener;

#[cfg(test)]
#[path = "pr_tests.rs"]
mod tests;
