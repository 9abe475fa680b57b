// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health and recovery sweeps.
//!
//! A singleton ticker in the daemon calls [`HealthSweeper::sweep`] every 30
//! seconds: active instances past the heartbeat threshold become `stale`
//! (never auto-closed), and running spawns past the abandon window (their
//! orchestrator died with the previous process) become `abandoned`.

use std::time::Duration;
use sup_core::{AgentId, Clock, IdGen, InstanceId};
use sup_storage::{InstanceStore, SpawnStore, StorageError};
use tracing::info;

/// Cadence of health sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Running spawns older than this are presumed orphaned. Twice the default
/// phase deadline leaves room for a slow-but-live orchestrator.
pub const DEFAULT_SPAWN_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub stale_instances: Vec<InstanceId>,
    pub abandoned_spawns: Vec<AgentId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.stale_instances.is_empty() && self.abandoned_spawns.is_empty()
    }
}

/// Stalled-spawn detection and session heartbeat sweep.
#[derive(Clone)]
pub struct HealthSweeper<C: Clock, G: IdGen> {
    instances: InstanceStore<C, G>,
    spawns: SpawnStore<C>,
    spawn_max_age: Duration,
}

impl<C: Clock, G: IdGen> HealthSweeper<C, G> {
    pub fn new(instances: InstanceStore<C, G>, spawns: SpawnStore<C>) -> Self {
        Self {
            instances,
            spawns,
            spawn_max_age: DEFAULT_SPAWN_MAX_AGE,
        }
    }

    pub fn with_spawn_max_age(mut self, max_age: Duration) -> Self {
        self.spawn_max_age = max_age;
        self
    }

    /// One full pass. Safe to run concurrently with the hot path; both
    /// underlying stores use short transactions.
    pub fn sweep(&self) -> Result<SweepReport, StorageError> {
        let report = SweepReport {
            stale_instances: self.instances.sweep_stale()?,
            abandoned_spawns: self.spawns.abandon_older_than(self.spawn_max_age)?,
        };
        if !report.is_empty() {
            info!(
                stale = report.stale_instances.len(),
                abandoned = report.abandoned_spawns.len(),
                "health sweep applied transitions"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
