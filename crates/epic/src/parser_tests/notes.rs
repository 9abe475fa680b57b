// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn notes_preserve_order() {
    let (epic, _) = parse_epic(FULL_EPIC);
    assert_eq!(
        epic.implementation_notes,
        vec![
            "Create src/hello.ts exporting hello()",
            "Add test tests/hello.spec.ts",
        ]
    );
}

#[test]
fn notes_accept_paren_numbering() {
    let doc = "## Implementation Notes\n\n1) first\n2) second\n";
    let (epic, _) = parse_epic(doc);
    assert_eq!(epic.implementation_notes, vec!["first", "second"]);
}

#[test]
fn continuation_lines_fold_into_previous_note() {
    let doc = "## Implementation Notes\n\n1. first step\n   carries over\n2. second\n";
    let (epic, _) = parse_epic(doc);
    assert_eq!(
        epic.implementation_notes,
        vec!["first step carries over", "second"]
    );
}

#[test]
fn unnumbered_lines_before_any_note_are_dropped() {
    let doc = "## Implementation Notes\n\npreamble prose\n1. only step\n";
    let (epic, _) = parse_epic(doc);
    assert_eq!(epic.implementation_notes, vec!["only step"]);
}

#[test]
fn missing_notes_section_yields_empty_list() {
    let (epic, _) = parse_epic("# Epic 1: x\n\n## Acceptance Criteria\n\n- [ ] a\n");
    assert!(epic.implementation_notes.is_empty());
}
