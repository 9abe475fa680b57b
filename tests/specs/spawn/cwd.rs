//! Working-directory resolution: the CLI always runs inside the project
//! tree, never the supervisor's own directory, and no fabricated path is
//! ever used.

use crate::prelude::World;
use serde_json::{Map, Value};
use std::sync::Arc;
use sup_adapters::FakeRun;
use sup_core::{Project, TaskType};
use sup_engine::{CallerContext, EngineError, SpawnParams};

fn params(task_type: TaskType, description: &str) -> SpawnParams {
    SpawnParams {
        task_type,
        description: description.to_string(),
        context: Map::new(),
        complexity_hint: None,
        estimated_tokens: None,
        deadline: None,
    }
}

#[tokio::test]
async fn endpoint_project_supplies_the_cwd() {
    let world = World::new();
    let (_id, mut caller) = world.session("consilio");
    caller.project = Some(Arc::new(Project {
        name: "consilio".to_string(),
        display_name: "Consilio".to_string(),
        path: world.project_dir.path().to_path_buf(),
        description: String::new(),
        tools: Vec::new(),
        enabled: true,
    }));
    world.codex.push_run(FakeRun::ok("worked"));

    // No explicit project_path in the spawn context
    let outcome = world
        .engine
        .spawn_subagent(params(TaskType::Implementation, "wire the feature"), &caller)
        .await
        .unwrap();
    assert!(outcome.success);

    // The CLI ran with the endpoint project's path as cwd
    let calls = world.codex.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].cwd, world.project_dir.path());

    // The spawn row records the same path the CLI ran in
    let record = world.spawns.get(&outcome.agent_id).unwrap().unwrap();
    assert_eq!(record.project_path, calls[0].cwd);

    // Output landed in the agents work dir, not the supervisor's cwd
    assert!(outcome.output_path.starts_with(world.work_dir.path()));
    assert!(!outcome
        .output_path
        .starts_with(std::env::current_dir().unwrap()));
}

#[tokio::test]
async fn explicit_context_path_wins_over_endpoint() {
    let world = World::new();
    let (_id, mut caller) = world.session("demo");
    caller.project = Some(Arc::new(Project {
        name: "demo".to_string(),
        display_name: "Demo".to_string(),
        path: "/projects/endpoint-default".into(),
        description: String::new(),
        tools: Vec::new(),
        enabled: true,
    }));
    world.codex.push_run(FakeRun::ok(""));

    let mut p = params(TaskType::Implementation, "work");
    p.context.insert(
        "project_path".to_string(),
        Value::String(world.project_dir.path().display().to_string()),
    );
    world.engine.spawn_subagent(p, &caller).await.unwrap();

    assert_eq!(world.codex.calls()[0].cwd, world.project_dir.path());
}

#[tokio::test]
async fn no_context_at_all_never_fabricates_a_path() {
    let world = World::new();
    let (_id, caller) = world.session("demo"); // no project attached

    let err = world
        .engine
        .spawn_subagent(params(TaskType::Implementation, "work"), &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoProjectContext), "{err}");

    // No instruction file, no ActiveSpawn row, no CLI invocation
    assert_eq!(
        std::fs::read_dir(world.work_dir.path()).unwrap().count(),
        0
    );
    assert!(world.spawns.running().unwrap().is_empty());
    assert!(world.codex.calls().is_empty());
}

#[tokio::test]
async fn anonymous_caller_still_gets_strict_resolution() {
    let world = World::new();
    let err = world
        .engine
        .spawn_subagent(
            params(TaskType::Fix, "fix it"),
            &CallerContext::anonymous(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoProjectContext));
}
