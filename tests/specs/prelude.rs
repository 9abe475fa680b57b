//! Shared fixture for behavioral specifications.
//!
//! One `World` is a complete in-process supervisor: SQLite-backed stores,
//! fake CLI adapters for all three services, the spawn engine, and an
//! orchestrator with a short phase deadline so timeout scenarios run fast.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sup_adapters::{AdapterSet, FakeCliAdapter, FakeRun};
use sup_core::{FakeClock, InstanceId, InstanceType, Service, UuidIdGen};
use sup_engine::{
    CallerContext, EpicRequest, FakePrOpener, HealthSweeper, Orchestrator, SpawnEngine,
    SpawnLimits,
};
use sup_epic::TemplateLibrary;
use sup_storage::{EventStore, Gateway, InstanceStore, SpawnStore};

pub const PHASE_DEADLINE: Duration = Duration::from_millis(200);

pub struct World {
    pub clock: FakeClock,
    pub instances: InstanceStore<FakeClock, UuidIdGen>,
    pub events: EventStore<FakeClock>,
    pub spawns: SpawnStore<FakeClock>,
    pub engine: Arc<SpawnEngine<FakeClock, UuidIdGen>>,
    pub orchestrator: Orchestrator<FakeClock, UuidIdGen>,
    pub sweeper: HealthSweeper<FakeClock, UuidIdGen>,
    pub pr: Arc<FakePrOpener>,
    pub claude: Arc<FakeCliAdapter>,
    pub gemini: Arc<FakeCliAdapter>,
    pub codex: Arc<FakeCliAdapter>,
    pub work_dir: tempfile::TempDir,
    pub project_dir: tempfile::TempDir,
    pub epic_dir: tempfile::TempDir,
}

impl World {
    pub fn new() -> Self {
        let gateway = Gateway::open_in_memory().unwrap();
        let clock = FakeClock::new();
        let instances = InstanceStore::new(gateway.clone(), clock.clone(), UuidIdGen);
        let events = EventStore::new(gateway.clone(), clock.clone());
        let spawns = SpawnStore::new(gateway, clock.clone());

        let claude = Arc::new(FakeCliAdapter::new(Service::Claude));
        let gemini = Arc::new(FakeCliAdapter::new(Service::Gemini));
        let codex = Arc::new(FakeCliAdapter::new(Service::Codex));
        let adapters = AdapterSet::new()
            .with(claude.clone())
            .with(gemini.clone())
            .with(codex.clone());

        let work_dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SpawnEngine::new(
            events.clone(),
            spawns.clone(),
            adapters,
            Arc::new(TemplateLibrary::builtin()),
            Arc::new(SpawnLimits::default()),
            clock.clone(),
            UuidIdGen,
            work_dir.path().to_path_buf(),
        ));
        let pr = Arc::new(FakePrOpener::new());
        let orchestrator = Orchestrator::new(Arc::clone(&engine), events.clone(), pr.clone())
            .with_phase_deadline(PHASE_DEADLINE);
        let sweeper = HealthSweeper::new(instances.clone(), spawns.clone());

        Self {
            clock,
            instances,
            events,
            spawns,
            engine,
            orchestrator,
            sweeper,
            pr,
            claude,
            gemini,
            codex,
            work_dir,
            project_dir: tempfile::tempdir().unwrap(),
            epic_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Register a supervisor session and return a caller context bound to it.
    pub fn session(&self, project: &str) -> (InstanceId, CallerContext) {
        let instance = self
            .instances
            .register(project, InstanceType::Ps, None)
            .unwrap();
        let caller = CallerContext {
            instance_id: Some(instance.id.clone()),
            project: None,
        };
        (instance.id, caller)
    }

    /// Write an epic file and build a request for it.
    pub fn epic(&self, content: &str, create_pr: bool) -> EpicRequest {
        let epic_file = self.epic_dir.path().join("epic.md");
        std::fs::write(&epic_file, content).unwrap();
        EpicRequest {
            project_name: Some("demo".to_string()),
            project_path: Some(self.project_dir.path().to_path_buf()),
            epic_file,
            create_pr,
        }
    }

    /// Scripted verdict output for a validation subagent.
    pub fn verdict(met: bool, evidence: &str) -> FakeRun {
        FakeRun::ok(format!(
            "VERDICT: {{\"met\": {met}, \"evidence\": \"{evidence}\"}}\n"
        ))
    }
}
