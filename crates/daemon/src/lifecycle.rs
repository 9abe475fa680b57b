// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, reload, shutdown.

use crate::endpoint::{EndpointShared, StatsHub};
use crate::env;
use crate::mux::Multiplexer;
use crate::projects::{load_projects, ProjectsError};
use crate::registry::ToolRegistry;
use crate::tools::{apply_scopes, register_builtin, ToolDeps};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sup_adapters::AdapterSet;
use sup_core::{SystemClock, UuidIdGen};
use sup_engine::{
    GhPrOpener, HealthSweeper, Orchestrator, SpawnEngine, SpawnLimits, DEFAULT_CLI_PROCESSES,
    SWEEP_INTERVAL,
};
use sup_epic::TemplateLibrary;
use sup_storage::{EventStore, Gateway, InstanceStore, SecretStore, SpawnStore, StorageError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Concrete engine/orchestrator/multiplexer types the daemon runs with.
pub type DaemonEngine = SpawnEngine<SystemClock, UuidIdGen>;
pub type DaemonOrchestrator = Orchestrator<SystemClock, UuidIdGen>;
pub type DaemonMux = Multiplexer<SystemClock>;
pub type DaemonSweeper = HealthSweeper<SystemClock, UuidIdGen>;

/// Errors during daemon lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory (set SUP_STATE_DIR or HOME)")]
    NoStateDir,
    #[error("another supd instance holds the lock: {0}")]
    LockFailed(std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Projects(#[from] ProjectsError),
    #[error("config error: {0}")]
    Config(String),
    #[error("tool registration failed: {0}")]
    Tools(String),
}

/// Daemon configuration.
///
/// All paths live under one state directory; credentials come from the
/// environment exactly once, here.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub endpoints_dir: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub projects_path: PathBuf,
    pub quota_dir: PathBuf,
    /// Agent instruction/output files (a temp location, not state)
    pub agents_dir: PathBuf,
    pub sweep_interval: Duration,
    pub cli_processes: usize,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            db_path: env::db_path().unwrap_or_else(|| state_dir.join("sup.db")),
            endpoints_dir: state_dir.join("endpoints"),
            lock_path: state_dir.join("supd.pid"),
            version_path: state_dir.join("supd.version"),
            log_path: state_dir.join("supd.log"),
            projects_path: env::projects_path()
                .unwrap_or_else(|| state_dir.join("projects.toml")),
            quota_dir: env::quota_dir().unwrap_or_else(|| state_dir.join("quota")),
            agents_dir: env::agents_dir(),
            sweep_interval: env::sweep_interval().unwrap_or(SWEEP_INTERVAL),
            cli_processes: DEFAULT_CLI_PROCESSES,
            state_dir,
        })
    }
}

/// Running daemon state.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub mux: Arc<DaemonMux>,
    pub registry: Arc<ToolRegistry>,
    pub sweeper: DaemonSweeper,
    pub start_time: Instant,
}

/// Result of daemon startup.
///
/// The reload receiver is returned separately so the main loop can poll it
/// while the rest of the state is borrowed by other select branches.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// Fired by the meta `reload_projects` tool
    pub reload_rx: mpsc::Receiver<()>,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for StartupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupResult").finish_non_exhaustive()
    }
}

impl DaemonState {
    /// Reload the project snapshot: re-read config, re-apply scopes, rebind
    /// endpoints. In-flight requests keep their original snapshot.
    pub fn reload(&self) -> Result<(), LifecycleError> {
        let snapshot = load_projects(&self.config.projects_path)?;
        apply_scopes(&self.registry, &snapshot);
        self.mux.reload(&snapshot)?;
        Ok(())
    }

    /// Tear down endpoints and release state files.
    pub fn shutdown(&self) {
        self.mux.shutdown();
        let _ = std::fs::remove_file(&self.config.lock_path);
        let _ = std::fs::remove_file(&self.config.version_path);
        info!("daemon state released");
    }
}

/// Bring the daemon up: lock, storage, engine, tools, endpoints.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Exactly one daemon per state dir. Open without truncating so a losing
    // contender does not clobber the winner's pid.
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    let gateway = Gateway::open(&config.db_path)?;
    let clock = SystemClock;
    let instances = InstanceStore::new(gateway.clone(), clock.clone(), UuidIdGen);
    let events = EventStore::new(gateway.clone(), clock.clone());
    let spawns = SpawnStore::new(gateway.clone(), clock.clone());
    let secrets = env::secret_key()?
        .map(|(key, key_id)| SecretStore::new(gateway.clone(), &key, key_id, clock.clone()));

    let adapters = AdapterSet::production(Some(&config.quota_dir));
    let engine = Arc::new(SpawnEngine::new(
        events.clone(),
        spawns.clone(),
        adapters,
        Arc::new(TemplateLibrary::builtin()),
        Arc::new(SpawnLimits::new(config.cli_processes)),
        clock.clone(),
        UuidIdGen,
        config.agents_dir.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&engine),
        events.clone(),
        Arc::new(GhPrOpener::new()),
    ));

    let hub = StatsHub::new();
    let (reload_tx, reload_rx) = mpsc::channel(4);
    let start_time = Instant::now();
    let registry = Arc::new(ToolRegistry::new());
    register_builtin(
        &registry,
        &ToolDeps {
            instances: instances.clone(),
            events: events.clone(),
            spawns: spawns.clone(),
            secrets,
            engine,
            orchestrator,
            stats: hub.clone(),
            reload_tx,
            start_time,
        },
    )
    .map_err(|e| LifecycleError::Tools(e.to_string()))?;

    let snapshot = load_projects(&config.projects_path)?;
    apply_scopes(&registry, &snapshot);

    let shared = Arc::new(EndpointShared {
        registry: Arc::clone(&registry),
        events,
        server_version: env!("CARGO_PKG_VERSION"),
    });
    let mux = Arc::new(Multiplexer::new(
        shared,
        hub,
        config.endpoints_dir.clone(),
        &config.state_dir,
    ));
    mux.start(&snapshot)?;

    let sweeper = HealthSweeper::new(instances, spawns);

    info!(
        state_dir = %config.state_dir.display(),
        endpoints = mux.endpoint_count(),
        "daemon started"
    );
    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            mux,
            registry,
            sweeper,
            start_time,
        },
        reload_rx,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
