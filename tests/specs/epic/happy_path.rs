//! Happy-path epic: two implementation steps in order, two concurrent
//! validations, five events, both spawns completed.

use crate::prelude::World;
use sup_adapters::FakeRun;
use sup_core::EventType;
use sup_storage::SpawnStatus;

const EPIC: &str = r#"# Epic 1: Hello module

## Implementation Notes

1. Create src/hello.ts exporting hello()
2. Add test tests/hello.spec.ts

## Acceptance Criteria

- [ ] hello.ts exists
- [ ] tests pass
"#;

#[tokio::test]
async fn two_steps_two_criteria_full_success() {
    let world = World::new();
    let (id, caller) = world.session("demo");

    world.codex.push_run(FakeRun::ok("created hello.ts"));
    world.codex.push_run(FakeRun::ok("added the test file"));
    world.codex.push_run(World::verdict(true, "hello.ts present"));
    world.codex.push_run(World::verdict(true, "suite green"));

    let outcome = world
        .orchestrator
        .implement_epic(&world.epic(EPIC, false), &caller)
        .await
        .unwrap();

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.tasks_completed, 2);
    let validation = outcome.criteria_validation.unwrap();
    assert!(validation.all_met);
    assert_eq!(validation.results.len(), 2);
    assert!(validation.results.iter().all(|r| r.met));

    // Exactly 5 events recorded for the run (after the registration event):
    // task_spawned x2, validation_passed x2, epic_completed
    let stream = world.events.replay(&id, 2).unwrap();
    assert_eq!(stream.len(), 5, "{stream:#?}");
    let types: Vec<EventType> = stream.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::TaskSpawned,
            EventType::TaskSpawned,
            EventType::ValidationPassed,
            EventType::ValidationPassed,
            EventType::EpicCompleted,
        ]
    );

    // Validation events satisfy the success invariant: every criterion has
    // a validation event with met = true
    for event in stream
        .iter()
        .filter(|e| e.event_type == EventType::ValidationPassed)
    {
        assert_eq!(event.event_data["met"], true);
    }

    // Both implementation spawns are terminal and completed
    let impl_spawns: Vec<_> = world
        .events
        .replay(&id, 2)
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::TaskSpawned)
        .collect();
    for event in impl_spawns {
        let agent_id = sup_core::AgentId::new(
            event.event_data["agent_id"].as_str().unwrap().to_string(),
        );
        let record = world.spawns.get(&agent_id).unwrap().unwrap();
        assert_eq!(record.status, SpawnStatus::Completed);
    }

    // Implementation ran strictly in note order
    let calls = world.codex.calls();
    assert!(calls[0].instructions.contains("Create src/hello.ts"));
    assert!(calls[1].instructions.contains("Add test tests/hello.spec.ts"));
}

#[tokio::test]
async fn empty_plan_fails_before_any_spawn() {
    let world = World::new();
    let (_id, caller) = world.session("demo");

    let outcome = world
        .orchestrator
        .implement_epic(
            &world.epic("# Epic 2: nothing\n\n## Acceptance Criteria\n\n- [ ] x\n", false),
            &caller,
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.reason.as_deref(), Some("EmptyPlan"));
    assert!(world.codex.calls().is_empty());
}
