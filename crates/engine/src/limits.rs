// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency bounds for external work.

use crate::error::EngineError;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Default cap on concurrent external CLI processes.
pub const DEFAULT_CLI_PROCESSES: usize = 8;

/// Default cap on concurrent validation spawns per orchestrator.
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 4;

/// Global scheduler bounds shared by every spawn path.
pub struct SpawnLimits {
    cli: Semaphore,
}

impl SpawnLimits {
    pub fn new(max_cli_processes: usize) -> Self {
        Self {
            cli: Semaphore::new(max_cli_processes),
        }
    }

    /// Wait for a CLI process slot.
    pub async fn acquire_cli(&self) -> Result<SemaphorePermit<'_>, EngineError> {
        self.cli
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("spawn limiter closed".to_string()))
    }

    pub fn available_cli_slots(&self) -> usize {
        self.cli.available_permits()
    }
}

impl Default for SpawnLimits {
    fn default() -> Self {
        Self::new(DEFAULT_CLI_PROCESSES)
    }
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
