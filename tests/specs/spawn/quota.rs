//! Quota exhaustion: preferred and fallback services all report empty,
//! the spawn fails cleanly before any side effects.

use crate::prelude::World;
use serde_json::{Map, Value};
use sup_adapters::QuotaStatus;
use sup_core::{ComplexityHint, TaskType};
use sup_engine::{EngineError, SpawnParams};

fn spawn_params(world: &World) -> SpawnParams {
    let mut context = Map::new();
    context.insert(
        "project_path".to_string(),
        Value::String(world.project_dir.path().display().to_string()),
    );
    SpawnParams {
        task_type: TaskType::Implementation,
        description: "production-critical fix".to_string(),
        context,
        complexity_hint: Some(ComplexityHint::Complex),
        estimated_tokens: Some(50_000),
        deadline: None,
    }
}

#[tokio::test]
async fn all_services_exhausted_fails_with_zero_side_effects() {
    let world = World::new();
    for fake in [&world.claude, &world.gemini, &world.codex] {
        fake.set_quota(QuotaStatus::exhausted("weekly cap"));
    }
    let (id, caller) = world.session("demo");

    let err = world
        .engine
        .spawn_subagent(spawn_params(&world), &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::QuotaExhausted(_)), "{err}");
    assert_eq!(err.kind(), sup_core::ErrorKind::QuotaExhausted);

    // No instructions file was written
    assert_eq!(
        std::fs::read_dir(world.work_dir.path()).unwrap().count(),
        0
    );
    // No adapter was invoked
    assert!(world.claude.calls().is_empty());
    assert!(world.codex.calls().is_empty());

    // The command log records the failed attempt with zero duration
    let commands = world.events.commands(Some(&id), 10).unwrap();
    assert_eq!(commands.len(), 1);
    assert!(!commands[0].entry.success);
    assert_eq!(commands[0].entry.execution_time_ms, Some(0));
}

#[tokio::test]
async fn exhausted_preference_falls_over_to_cheapest_available() {
    let world = World::new();
    // Complex task prefers claude, which is out
    world.claude.set_quota(QuotaStatus::exhausted("weekly cap"));
    let (_id, caller) = world.session("demo");

    let outcome = world
        .engine
        .spawn_subagent(spawn_params(&world), &caller)
        .await
        .unwrap();
    assert!(outcome.success);
    // Gemini flash is the cheapest non-exhausted service
    assert_eq!(outcome.service, sup_core::Service::Gemini);
    assert_eq!(world.gemini.calls().len(), 1);
}
