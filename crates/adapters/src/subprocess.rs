// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with deadline termination.

use crate::cli::{AdapterError, RunOutput, RunRequest};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Grace period between SIGTERM and SIGKILL on deadline expiry.
pub const TERM_GRACE: Duration = Duration::from_secs(10);

/// Run `cmd` with stdin from the instruction file and stdout/stderr captured
/// to the request's output files.
///
/// On deadline expiry the child gets SIGTERM, then SIGKILL after
/// [`TERM_GRACE`], and `Timeout` is returned. The caller's environment and
/// working directory are never touched; only the child runs in `req.cwd`.
pub async fn run_to_files(
    mut cmd: Command,
    req: &RunRequest,
    description: &str,
) -> Result<RunOutput, AdapterError> {
    let start = Instant::now();
    let stdin = std::fs::File::open(&req.instructions_path)?;
    let stdout = std::fs::File::create(&req.stdout_path)?;
    let stderr = std::fs::File::create(&req.stderr_path)?;

    cmd.current_dir(&req.cwd)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| AdapterError::Spawn(format!("{description}: {e}")))?;

    let status = match req.deadline {
        None => child.wait().await?,
        Some(deadline) => match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_elapsed) => {
                warn!(
                    description,
                    deadline_secs = deadline.as_secs(),
                    "deadline expired, terminating"
                );
                terminate(&mut child, TERM_GRACE).await;
                return Err(AdapterError::Timeout { after: deadline });
            }
        },
    };

    let output = RunOutput {
        stdout_path: req.stdout_path.clone(),
        stderr_path: req.stderr_path.clone(),
        // None means killed by signal; surface as -1 rather than inventing a code
        exit_code: status.code().unwrap_or(-1),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    debug!(
        description,
        exit_code = output.exit_code,
        duration_ms = output.duration_ms,
        "subprocess finished"
    );
    Ok(output)
}

/// SIGTERM, wait out the grace period, then SIGKILL if still running.
pub async fn terminate(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return;
        }
        warn!(pid, "grace period expired, sending SIGKILL");
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
