// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::borrow::Borrow;
use std::collections::HashMap;
use yare::parameterized;

// --- define_id! macro tests ---

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn define_id_new_and_as_str() {
    let id = TestId::new("abc");
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn define_id_display() {
    let id = TestId::new("hello");
    assert_eq!(format!("{}", id), "hello");
}

#[test]
fn define_id_partial_eq_str() {
    let id = TestId::new("test");
    assert_eq!(id, "test");
}

#[test]
fn define_id_borrow_str() {
    let id = TestId::new("key");
    let borrowed: &str = id.borrow();
    assert_eq!(borrowed, "key");
}

#[test]
fn define_id_hash_map_lookup() {
    let mut map = HashMap::new();
    map.insert(TestId::new("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
}

#[test]
fn define_id_serde_roundtrip() {
    let id = TestId::new("serde-test");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"serde-test\"");
    let deserialized: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, id);
}

#[test]
fn define_id_short_truncates() {
    let id = TestId::new("abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
}

// --- instance id format ---

#[test]
fn instance_id_generate_matches_format() {
    let id = InstanceId::generate("consilio", InstanceType::Ps, &UuidIdGen);
    assert!(InstanceId::is_valid(id.as_str()), "invalid: {id}");
    assert!(id.as_str().starts_with("consilio-PS-"));
    assert_eq!(id.suffix().len(), 6);
}

#[test]
fn instance_id_generate_pads_short_sources() {
    let id_gen = SequentialIdGen::new("a");
    let id = InstanceId::generate("p", InstanceType::Ms, &id_gen);
    // "a-1" yields "a1" + zero padding
    assert_eq!(id.as_str(), "p-MS-a10000");
    assert!(InstanceId::is_valid(id.as_str()));
}

#[parameterized(
    valid_ps = { "consilio-PS-a1b2c3", true },
    valid_ms = { "my-project-MS-000000", true },
    bad_type = { "consilio-XS-a1b2c3", false },
    short_suffix = { "consilio-PS-a1b2", false },
    uppercase_suffix = { "consilio-PS-A1B2C3", false },
    no_project = { "-PS-a1b2c3", false },
    uppercase_project = { "Consilio-PS-a1b2c3", false },
    garbage = { "not-an-id", false },
    empty = { "", false },
)]
fn instance_id_validation(s: &str, expected: bool) {
    assert_eq!(InstanceId::is_valid(s), expected);
}

#[test]
fn agent_id_embeds_epoch_ms() {
    let id = AgentId::generate(1_700_000_000_123, &UuidIdGen);
    let (epoch, suffix) = id.as_str().split_once('-').unwrap();
    assert_eq!(epoch, "1700000000123");
    assert_eq!(suffix.len(), 8);
}

// --- IdGen ---

#[test]
fn uuid_gen_creates_unique_ids() {
    let id_gen = UuidIdGen;
    assert_ne!(id_gen.next(), id_gen.next());
}

#[test]
fn sequential_gen_creates_predictable_ids() {
    let id_gen = SequentialIdGen::new("test");
    assert_eq!(id_gen.next(), "test-1");
    assert_eq!(id_gen.next(), "test-2");
}

#[test]
fn sequential_gen_is_cloneable_and_shared() {
    let id_gen1 = SequentialIdGen::new("shared");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next(), "shared-1");
    assert_eq!(id_gen2.next(), "shared-2");
}
