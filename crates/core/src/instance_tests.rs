// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn sample(status: InstanceStatus, last_heartbeat: u64) -> Instance {
    Instance {
        id: InstanceId::new("demo-PS-a1b2c3"),
        project: "demo".to_string(),
        instance_type: InstanceType::Ps,
        status,
        context_percent: 0,
        current_epic: None,
        host_machine: None,
        created_at_epoch_ms: 1_000,
        last_heartbeat_epoch_ms: last_heartbeat,
        closed_at_epoch_ms: None,
    }
}

#[parameterized(
    fresh = { 1_000, 1_000, false },
    at_threshold = { 1_000, 121_000, false },
    just_past = { 1_000, 121_001, true },
    long_past = { 1_000, 10_000_000, true },
)]
fn staleness_boundary(heartbeat: u64, now: u64, expected: bool) {
    let inst = sample(InstanceStatus::Active, heartbeat);
    assert_eq!(inst.is_stale_at(now), expected);
}

#[test]
fn closed_instance_is_never_stale() {
    let mut inst = sample(InstanceStatus::Closed, 0);
    inst.closed_at_epoch_ms = Some(1);
    assert!(!inst.is_stale_at(u64::MAX));
}

#[test]
fn age_seconds_derivation() {
    let inst = sample(InstanceStatus::Active, 10_000);
    assert_eq!(inst.age_seconds_at(13_500), 3);
    assert_eq!(inst.age_seconds_at(9_000), 0); // clock skew clamps to zero
}

#[test]
fn instance_type_round_trip() {
    assert_eq!(InstanceType::parse("PS"), Some(InstanceType::Ps));
    assert_eq!(InstanceType::parse("MS"), Some(InstanceType::Ms));
    assert_eq!(InstanceType::parse("ps"), None);
    assert_eq!(
        serde_json::to_string(&InstanceType::Ps).unwrap(),
        "\"PS\""
    );
}

#[test]
fn status_round_trip() {
    for s in [
        InstanceStatus::Active,
        InstanceStatus::Stale,
        InstanceStatus::Closed,
    ] {
        assert_eq!(InstanceStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(InstanceStatus::parse("gone"), None);
}

#[test]
fn list_item_flattens_instance_fields() {
    let item = InstanceListItem {
        instance: sample(InstanceStatus::Active, 5_000),
        age_seconds: 7,
        stale: false,
    };
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["project"], "demo");
    assert_eq!(value["age_seconds"], 7);
}
