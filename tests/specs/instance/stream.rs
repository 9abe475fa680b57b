//! Event stream invariants: dense ordered sequences, closed-instance
//! append rejection, advisory checkpoints, and restartable replay.

use crate::prelude::World;
use serde_json::json;
use sup_core::{CheckpointType, EventType};
use sup_storage::StorageError;

#[test]
fn sequence_order_matches_time_order() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    for i in 0..6 {
        world
            .clock
            .advance(std::time::Duration::from_millis(50 + i));
        world
            .events
            .append(&id, EventType::TaskSpawned, json!({ "i": i }), json!({}))
            .unwrap();
    }

    let stream = world.events.replay(&id, 1).unwrap();
    assert_eq!(stream.len(), 7); // registration + 6

    // e1.created_at <= e2.created_at <=> e1.sequence_num < e2.sequence_num
    for pair in stream.windows(2) {
        assert!(pair[0].sequence_num < pair[1].sequence_num);
        assert!(pair[0].created_at_epoch_ms <= pair[1].created_at_epoch_ms);
    }
    // Dense: no gaps
    let seqs: Vec<u64> = stream.iter().map(|e| e.sequence_num).collect();
    assert_eq!(seqs, (1..=7).collect::<Vec<u64>>());
}

#[test]
fn closed_instances_accept_no_further_events() {
    let world = World::new();
    let (id, _caller) = world.session("demo");
    world.instances.close(&id).unwrap();

    let err = world
        .events
        .append(&id, EventType::FeatureRequested, json!({}), json!({}))
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)), "{err}");

    // The stream ends with the terminal close event
    let stream = world.events.replay(&id, 1).unwrap();
    assert_eq!(
        stream.last().map(|e| e.event_type),
        Some(EventType::InstanceClosed)
    );
}

#[test]
fn replay_is_restartable_mid_stream() {
    let world = World::new();
    let (id, _caller) = world.session("demo");
    for i in 0..5 {
        world
            .events
            .append(&id, EventType::TestPassed, json!({ "i": i }), json!({}))
            .unwrap();
    }

    // A reconstructor can stop and resume from any point
    let first_half = world.events.replay(&id, 1).unwrap();
    let resume_at = first_half[2].sequence_num + 1;
    let second_half = world.events.replay(&id, resume_at).unwrap();
    assert_eq!(
        first_half.len(),
        second_half.len() + resume_at as usize - 1
    );
    assert_eq!(second_half[0].sequence_num, resume_at);
}

#[test]
fn checkpoints_are_advisory_not_truncating() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    world
        .events
        .append(&id, EventType::TaskSpawned, json!({}), json!({}))
        .unwrap();
    let checkpoint = world
        .events
        .create_checkpoint(
            &id,
            CheckpointType::Automatic,
            json!({"cursor": "step-2"}),
            42,
        )
        .unwrap();
    world
        .events
        .append(&id, EventType::TestPassed, json!({}), json!({}))
        .unwrap();

    // Full replay still serves everything before the checkpoint
    let stream = world.events.replay(&id, 1).unwrap();
    assert_eq!(stream.len(), 4);

    // A recovering instance may skip ahead using the checkpoint instead
    let loaded = world.events.load_latest_checkpoint(&id).unwrap().unwrap();
    assert_eq!(loaded.checkpoint_id, checkpoint.checkpoint_id);
    let tail = world.events.replay(&id, loaded.sequence_num + 1).unwrap();
    assert!(tail
        .iter()
        .all(|e| e.sequence_num > checkpoint.sequence_num));
}

#[test]
fn command_log_survives_instance_streams_separately() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    world
        .events
        .log_command(
            Some(&id),
            sup_core::CommandEntry::tool_call("ping", json!({})),
        )
        .unwrap();
    world
        .events
        .log_command(None, sup_core::CommandEntry::tool_call("ping", json!({})))
        .unwrap();

    assert_eq!(world.events.commands(Some(&id), 10).unwrap().len(), 1);
    assert_eq!(world.events.commands(None, 10).unwrap().len(), 1);
}
