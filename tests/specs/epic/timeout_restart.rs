//! Phase timeout and restart: an overrunning implementation phase stalls
//! the spawn, the orchestrator reports the failed phase, and a later
//! `run_execute` resumes from the completed prefix.

use crate::prelude::World;
use std::time::Duration;
use sup_adapters::FakeRun;
use sup_storage::SpawnStatus;

const EPIC: &str = r#"# Epic 4: Importer

## Implementation Notes

1. Parse the source format
2. Write the importer

## Acceptance Criteria

- [ ] importer round-trips the sample file
"#;

#[tokio::test]
async fn phase_two_timeout_then_restart_resumes_at_task_two() {
    let world = World::new();
    let (_id, caller) = world.session("demo");

    // Step 1 completes; step 2 hangs past the phase deadline
    world.codex.push_run(FakeRun::ok("parser done"));
    world.codex.push_run(FakeRun::hanging(Duration::from_secs(3600)));

    let outcome = world
        .orchestrator
        .implement_epic(&world.epic(EPIC, false), &caller)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.phase.as_deref(), Some("execute"));
    assert_eq!(outcome.task_index, Some(1));
    assert_eq!(outcome.reason.as_deref(), Some("Timeout"));
    assert_eq!(outcome.tasks_completed, 1);

    // The overrunning spawn is stalled, the first one completed
    let mut statuses: Vec<SpawnStatus> = Vec::new();
    for event in world.events.replay(caller.instance_id.as_ref().unwrap(), 2).unwrap() {
        if let Some(agent_id) = event.event_data.get("agent_id").and_then(|v| v.as_str()) {
            if let Some(record) = world
                .spawns
                .get(&sup_core::AgentId::new(agent_id.to_string()))
                .unwrap()
            {
                statuses.push(record.status);
            }
        }
    }
    assert!(statuses.contains(&SpawnStatus::Completed));
    assert!(statuses.contains(&SpawnStatus::Stalled));

    // Restart the execute phase carrying the completed prefix
    world.codex.push_run(FakeRun::ok("importer written"));
    world
        .codex
        .push_run(World::verdict(true, "sample round-trips"));

    let retry = world
        .orchestrator
        .run_execute(
            &world.epic(EPIC, false),
            vec!["Parse the source format".to_string()],
            &caller,
        )
        .await
        .unwrap();

    assert!(retry.success, "{retry:?}");
    assert_eq!(retry.tasks_completed, 2);
    let validation = retry.criteria_validation.unwrap();
    assert!(validation.all_met);

    // Only task 2 was re-spawned: 2 original + 1 retry + 1 validation
    let calls = world.codex.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[2].instructions.contains("Write the importer"));
    // The retry prompt carried the previously completed step
    assert!(calls[2].instructions.contains("- Parse the source format"));
}

#[tokio::test]
async fn completed_tasks_longer_than_plan_is_rejected() {
    let world = World::new();
    let (_id, caller) = world.session("demo");

    let outcome = world
        .orchestrator
        .run_execute(
            &world.epic(EPIC, false),
            vec!["a".into(), "b".into(), "c".into()],
            &caller,
        )
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.reason.unwrap().contains("completed_tasks"));
}
