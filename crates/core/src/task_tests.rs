// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn task_type_parse_round_trip() {
    for t in TaskType::ALL {
        assert_eq!(TaskType::parse(t.as_str()), Some(t));
    }
    assert_eq!(TaskType::parse("refactoring"), None);
}

#[test]
fn task_type_serde_matches_as_str() {
    for t in TaskType::ALL {
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, format!("\"{}\"", t.as_str()));
    }
}

#[test]
fn service_parse_round_trip() {
    for s in Service::ALL {
        assert_eq!(Service::parse(s.as_str()), Some(s));
    }
    assert_eq!(Service::parse("openai"), None);
}

#[test]
fn complexity_hint_parse() {
    assert_eq!(ComplexityHint::parse("complex"), Some(ComplexityHint::Complex));
    assert_eq!(ComplexityHint::parse("hard"), None);
}
