// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::limits::SpawnLimits;
use crate::pr::FakePrOpener;
use std::sync::Arc;
use sup_adapters::{AdapterSet, FakeCliAdapter, FakeRun};
use sup_core::{FakeClock, InstanceType, Service, UuidIdGen};
use sup_storage::{Gateway, InstanceStore, SpawnStore};

const TWO_STEP_EPIC: &str = r#"# Epic 1: Hello module

## Implementation Notes

1. Create src/hello.ts exporting hello()
2. Add test tests/hello.spec.ts

## Acceptance Criteria

- [ ] hello.ts exists
- [ ] tests pass
"#;

struct Env {
    orchestrator: Orchestrator<FakeClock, UuidIdGen>,
    events: EventStore<FakeClock>,
    spawns: SpawnStore<FakeClock>,
    codex: Arc<FakeCliAdapter>,
    pr: Arc<FakePrOpener>,
    instance_id: sup_core::InstanceId,
    project_dir: tempfile::TempDir,
    epic_dir: tempfile::TempDir,
    #[allow(dead_code)]
    work_dir: tempfile::TempDir,
}

fn setup() -> Env {
    let gateway = Gateway::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let events = EventStore::new(gateway.clone(), clock.clone());
    let spawns = SpawnStore::new(gateway.clone(), clock.clone());
    let instances = InstanceStore::new(gateway, clock.clone(), UuidIdGen);
    let instance = instances.register("demo", InstanceType::Ps, None).unwrap();

    let codex = Arc::new(FakeCliAdapter::new(Service::Codex));
    let adapters = AdapterSet::new()
        .with(codex.clone())
        .with(Arc::new(FakeCliAdapter::new(Service::Claude)))
        .with(Arc::new(FakeCliAdapter::new(Service::Gemini)));

    let work_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(SpawnEngine::new(
        events.clone(),
        spawns.clone(),
        adapters,
        Arc::new(sup_epic::TemplateLibrary::builtin()),
        Arc::new(SpawnLimits::default()),
        clock,
        UuidIdGen,
        work_dir.path().to_path_buf(),
    ));
    let pr = Arc::new(FakePrOpener::new());
    let orchestrator = Orchestrator::new(engine, events.clone(), pr.clone())
        .with_phase_deadline(Duration::from_millis(200));

    Env {
        orchestrator,
        events,
        spawns,
        codex,
        pr,
        instance_id: instance.id,
        project_dir: tempfile::tempdir().unwrap(),
        epic_dir: tempfile::tempdir().unwrap(),
        work_dir,
    }
}

fn request(env: &Env, epic: &str, create_pr: bool) -> EpicRequest {
    let epic_file = env.epic_dir.path().join("epic.md");
    std::fs::write(&epic_file, epic).unwrap();
    EpicRequest {
        project_name: Some("demo".to_string()),
        project_path: Some(env.project_dir.path().to_path_buf()),
        epic_file,
        create_pr,
    }
}

fn caller(env: &Env) -> CallerContext {
    CallerContext {
        instance_id: Some(env.instance_id.clone()),
        project: None,
    }
}

fn verdict(met: bool) -> FakeRun {
    FakeRun::ok(format!(
        "inspecting...\nVERDICT: {{\"met\": {met}, \"evidence\": \"checked the tree\"}}\n"
    ))
}

#[tokio::test]
async fn happy_path_runs_all_tasks_then_validates() {
    let env = setup();
    env.codex.push_run(FakeRun::ok("step 1 done"));
    env.codex.push_run(FakeRun::ok("step 2 done"));
    env.codex.push_run(verdict(true));
    env.codex.push_run(verdict(true));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, TWO_STEP_EPIC, false), &caller(&env))
        .await
        .unwrap();

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.tasks_completed, 2);
    let validation = outcome.criteria_validation.unwrap();
    assert!(validation.all_met);
    assert_eq!(validation.results.len(), 2);
    assert!(validation.results.iter().all(|r| r.met));

    // Exactly five events beyond registration: two implementation spawns,
    // two validation verdicts, one terminal epic event
    let stream = env.events.replay(&env.instance_id, 2).unwrap();
    let types: Vec<EventType> = stream.iter().map(|e| e.event_type).collect();
    assert_eq!(types.len(), 5, "{types:?}");
    assert_eq!(&types[0..2], &[EventType::TaskSpawned, EventType::TaskSpawned]);
    assert_eq!(
        &types[2..4],
        &[EventType::ValidationPassed, EventType::ValidationPassed]
    );
    assert_eq!(types[4], EventType::EpicCompleted);

    // Both implementation spawns finished
    let completed = env
        .spawns
        .running()
        .unwrap();
    assert!(completed.is_empty());

    // Implementation order was strict: step 1 before step 2
    let calls = env.codex.calls();
    assert!(calls[0].instructions.contains("Create src/hello.ts"));
    assert!(calls[1].instructions.contains("Add test tests/hello.spec.ts"));
    // Step 2 saw step 1 in its completed list
    assert!(calls[1]
        .instructions
        .contains("- Create src/hello.ts exporting hello()"));
}

#[tokio::test]
async fn empty_plan_fails_without_spawning() {
    let env = setup();
    let outcome = env
        .orchestrator
        .implement_epic(
            &request(&env, "# Epic 2: empty\n\n## Acceptance Criteria\n\n- [ ] a\n", false),
            &caller(&env),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("load"));
    assert_eq!(outcome.reason.as_deref(), Some("EmptyPlan"));
    assert!(env.codex.calls().is_empty());

    let stream = env.events.replay(&env.instance_id, 2).unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].event_type, EventType::EpicFailed);
}

#[tokio::test]
async fn missing_epic_file_fails_load_phase() {
    let env = setup();
    let req = EpicRequest {
        project_name: None,
        project_path: Some(env.project_dir.path().to_path_buf()),
        epic_file: env.epic_dir.path().join("missing.md"),
        create_pr: false,
    };
    let outcome = env
        .orchestrator
        .implement_epic(&req, &caller(&env))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("load"));
    assert!(outcome.reason.unwrap().contains("cannot read epic file"));
}

#[tokio::test]
async fn task_failure_stops_the_run_without_validation() {
    let env = setup();
    env.codex.push_run(FakeRun::ok("step 1 done"));
    env.codex.push_run(FakeRun::failing(1, "compile error"));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, TWO_STEP_EPIC, false), &caller(&env))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("execute"));
    assert_eq!(outcome.task_index, Some(1));
    assert_eq!(outcome.tasks_completed, 1);
    assert!(outcome.criteria_validation.is_none());
    // Only the two implementation spawns ran, no validation spawns
    assert_eq!(env.codex.calls().len(), 2);
}

#[tokio::test]
async fn phase_timeout_marks_spawn_stalled_and_is_restartable() {
    let env = setup();
    env.codex.push_run(FakeRun::ok("step 1 done"));
    env.codex.push_run(FakeRun::hanging(Duration::from_secs(3600)));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, TWO_STEP_EPIC, false), &caller(&env))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("execute"));
    assert_eq!(outcome.task_index, Some(1));
    assert_eq!(outcome.reason.as_deref(), Some("Timeout"));

    // The second spawn is stalled
    let stalled: Vec<_> = env
        .codex
        .calls()
        .iter()
        .map(|c| c.cwd.clone())
        .collect();
    assert_eq!(stalled.len(), 2);
    let all = env.spawns.running().unwrap();
    assert!(all.is_empty(), "stalled spawn still listed as running");

    // Restart: only task 2 re-runs, then validation proceeds
    env.codex.push_run(FakeRun::ok("step 2 done"));
    env.codex.push_run(verdict(true));
    env.codex.push_run(verdict(true));
    let retry = env
        .orchestrator
        .run_execute(
            &request(&env, TWO_STEP_EPIC, false),
            vec!["Create src/hello.ts exporting hello()".to_string()],
            &caller(&env),
        )
        .await
        .unwrap();
    assert!(retry.success, "{retry:?}");
    assert_eq!(retry.tasks_completed, 2);

    // The retry run spawned one implementation + two validations
    assert_eq!(env.codex.calls().len(), 5);
    let retry_impl = &env.codex.calls()[2];
    assert!(retry_impl.instructions.contains("Add test tests/hello.spec.ts"));
    assert!(retry_impl
        .instructions
        .contains("- Create src/hello.ts exporting hello()"));
}

#[tokio::test]
async fn unmet_criteria_fail_the_epic_and_skip_the_pr() {
    let env = setup();
    env.codex.push_run(FakeRun::ok("step 1 done"));
    env.codex.push_run(FakeRun::ok("step 2 done"));
    env.codex.push_run(verdict(false));
    env.codex.push_run(verdict(false));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, TWO_STEP_EPIC, true), &caller(&env))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("validate"));
    let validation = outcome.criteria_validation.unwrap();
    assert!(!validation.all_met);
    assert_eq!(validation.results.len(), 2);
    assert!(validation.results.iter().all(|r| !r.met));

    // createPR=true never fires without full success
    assert!(env.pr.calls().is_empty());
    assert!(outcome.pr_url.is_none());
}

#[tokio::test]
async fn single_unmet_criterion_is_flagged_with_evidence() {
    let env = setup();
    let epic = "# Epic 3: one\n\n## Implementation Notes\n\n1. do it\n\n\
                ## Acceptance Criteria\n\n- [ ] the one check\n";
    env.codex.push_run(FakeRun::ok("done"));
    env.codex.push_run(FakeRun::ok(
        "VERDICT: {\"met\": false, \"evidence\": \"file missing\"}",
    ));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, epic, false), &caller(&env))
        .await
        .unwrap();
    let validation = outcome.criteria_validation.unwrap();
    assert_eq!(validation.results[0].criterion, "the one check");
    assert_eq!(validation.results[0].evidence, "file missing");

    let stream = env.events.replay(&env.instance_id, 2).unwrap();
    assert!(stream
        .iter()
        .any(|e| e.event_type == EventType::ValidationFailed));
}

#[tokio::test]
async fn missing_verdict_counts_as_unmet() {
    let env = setup();
    let epic = "# Epic 4: quiet\n\n## Implementation Notes\n\n1. do it\n\n\
                ## Acceptance Criteria\n\n- [ ] silent check\n";
    env.codex.push_run(FakeRun::ok("done"));
    env.codex.push_run(FakeRun::ok("I looked around but forgot to answer"));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, epic, false), &caller(&env))
        .await
        .unwrap();
    let validation = outcome.criteria_validation.unwrap();
    assert!(!validation.results[0].met);
    assert!(validation.results[0].evidence.contains("no verdict"));
}

#[tokio::test]
async fn full_success_with_create_pr_opens_one_pr() {
    let env = setup();
    env.codex.push_run(FakeRun::ok("step 1 done"));
    env.codex.push_run(FakeRun::ok("step 2 done"));
    env.codex.push_run(verdict(true));
    env.codex.push_run(verdict(true));

    let outcome = env
        .orchestrator
        .implement_epic(&request(&env, TWO_STEP_EPIC, true), &caller(&env))
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.pr_url.is_some());
    let calls = env.pr.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, env.project_dir.path());
    assert!(calls[0].1.contains("Epic 1"));

    let stream = env.events.replay(&env.instance_id, 2).unwrap();
    assert!(stream.iter().any(|e| e.event_type == EventType::PrCreated));
}

#[tokio::test]
async fn run_prime_emits_epic_started_and_spawns_research() {
    let env = setup();
    // Research routes to gemini; script it there
    let gemini = Arc::new(FakeCliAdapter::new(Service::Gemini));
    gemini.push_run(FakeRun::ok("context primed"));
    let gateway = Gateway::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let events = EventStore::new(gateway.clone(), clock.clone());
    let spawns = SpawnStore::new(gateway.clone(), clock.clone());
    let instances = InstanceStore::new(gateway, clock.clone(), UuidIdGen);
    let instance = instances.register("demo", InstanceType::Ps, None).unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(SpawnEngine::new(
        events.clone(),
        spawns,
        AdapterSet::new().with(gemini.clone()),
        Arc::new(sup_epic::TemplateLibrary::builtin()),
        Arc::new(SpawnLimits::default()),
        clock,
        UuidIdGen,
        work_dir.path().to_path_buf(),
    ));
    let orchestrator = Orchestrator::new(engine, events.clone(), Arc::new(FakePrOpener::new()));

    let epic_dir = tempfile::tempdir().unwrap();
    let epic_file = epic_dir.path().join("epic.md");
    std::fs::write(&epic_file, TWO_STEP_EPIC).unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let req = EpicRequest {
        project_name: Some("demo".to_string()),
        project_path: Some(project_dir.path().to_path_buf()),
        epic_file,
        create_pr: false,
    };
    let caller = CallerContext {
        instance_id: Some(instance.id.clone()),
        project: None,
    };

    let outcome = orchestrator.run_prime(&req, &caller).await.unwrap();
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.phase, "prime");
    assert!(outcome.agent_id.is_some());
    assert_eq!(gemini.calls().len(), 1);

    let stream = events.replay(&instance.id, 2).unwrap();
    assert_eq!(stream[0].event_type, EventType::EpicStarted);
}

#[tokio::test]
async fn run_plan_emits_epic_planned() {
    let env = setup();
    // Planning routes to gemini; add a scripted gemini to the shared set is
    // not possible post-construction, so verify via the event stream only.
    let outcome = env
        .orchestrator
        .run_plan(&request(&env, TWO_STEP_EPIC, false), &caller(&env))
        .await
        .unwrap();
    assert_eq!(outcome.phase, "plan");

    let stream = env.events.replay(&env.instance_id, 2).unwrap();
    assert_eq!(stream[0].event_type, EventType::EpicPlanned);
}
