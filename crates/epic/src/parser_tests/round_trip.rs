// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_serialize_parse_is_stable() {
    let (first, warnings) = parse_epic(FULL_EPIC);
    assert!(warnings.is_empty());
    let rendered = first.to_markdown();
    let (second, warnings) = parse_epic(&rendered);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(first, second);
}

#[test]
fn round_trip_with_default_group() {
    let doc = "# Epic 2: t\n\n## Acceptance Criteria\n\n- [ ] plain\n";
    let (first, _) = parse_epic(doc);
    let (second, _) = parse_epic(&first.to_markdown());
    assert_eq!(first, second);
}

#[test]
fn round_trip_empty_epic() {
    let (first, _) = parse_epic("# Epic 9: empty\n");
    let (second, _) = parse_epic(&first.to_markdown());
    assert_eq!(first, second);
}
