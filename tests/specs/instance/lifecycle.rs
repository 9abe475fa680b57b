//! Session lifecycle: registration, heartbeat boundaries, stale detection,
//! prefix lookup, and idempotent close.

use crate::prelude::World;
use std::time::Duration;
use sup_core::InstanceStatus;
use sup_storage::{InstanceLookup, StorageError};

#[test]
fn register_then_lookup_returns_the_same_instance() {
    let world = World::new();
    let (id, _caller) = world.session("consilio");

    match world.instances.get_details(id.as_str()).unwrap() {
        InstanceLookup::Exact(found) => {
            assert_eq!(found.id, id);
            assert_eq!(found.project, "consilio");
            assert_eq!(found.status, InstanceStatus::Active);
        }
        other => panic!("expected exact lookup, got {other:?}"),
    }
}

#[test]
fn heartbeat_percent_boundaries_hold() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    world.instances.heartbeat(&id, 0, None).unwrap();
    world.instances.heartbeat(&id, 100, None).unwrap();
    for bad in [-1, 101] {
        let err = world.instances.heartbeat(&id, bad, None).unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "{bad}: {err}");
    }
}

#[test]
fn stale_detection_scenario() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    // t = 119s: still listed as fresh
    world.clock.advance(Duration::from_secs(119));
    let listed = world.instances.list(Some("demo"), true).unwrap();
    assert!(!listed[0].stale);

    // t = 121s: the sweep transitions it
    world.clock.advance(Duration::from_secs(2));
    let report = world.sweeper.sweep().unwrap();
    assert_eq!(report.stale_instances, vec![id.clone()]);

    let listed = world.instances.list(Some("demo"), true).unwrap();
    assert!(listed[0].stale);
    assert_eq!(listed[0].instance.status, InstanceStatus::Stale);

    // A fresh heartbeat revives the session
    let revived = world.instances.heartbeat(&id, 10, None).unwrap();
    assert_eq!(revived.status, InstanceStatus::Active);
}

#[test]
fn stale_instances_are_never_auto_closed() {
    let world = World::new();
    let (id, _caller) = world.session("demo");
    world.clock.advance(Duration::from_secs(3600));
    world.sweeper.sweep().unwrap();

    let instance = world.instances.get(&id).unwrap();
    assert_eq!(instance.status, InstanceStatus::Stale);
    assert!(instance.closed_at_epoch_ms.is_none());
}

#[test]
fn close_is_idempotent_and_final() {
    let world = World::new();
    let (id, _caller) = world.session("demo");

    let closed = world.instances.close(&id).unwrap();
    assert_eq!(closed.status, InstanceStatus::Closed);
    assert!(closed.closed_at_epoch_ms.is_some());

    // Second close: no-op returning the already-closed row
    let again = world.instances.close(&id).unwrap();
    assert_eq!(again, closed);

    // Closed means closed: no heartbeat revival
    let err = world.instances.heartbeat(&id, 10, None).unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)), "{err}");
}

#[test]
fn suffix_lookup_modes() {
    let world = World::new();
    let (a, _) = world.session("demo");
    let (b, _) = world.session("demo");

    // The full 6-hex suffix resolves exactly, even among siblings
    match world.instances.get_details(a.suffix()).unwrap() {
        InstanceLookup::Exact(found) => assert_eq!(found.id, a),
        other => panic!("expected exact suffix match, got {other:?}"),
    }
    match world.instances.get_details(b.suffix()).unwrap() {
        InstanceLookup::Exact(found) => assert_eq!(found.id, b),
        other => panic!("expected exact suffix match, got {other:?}"),
    }

    // A prefix matching nothing is NotFound, never a silent partial match
    assert_eq!(
        world.instances.get_details("zzzzzz").unwrap(),
        InstanceLookup::NotFound
    );
}
