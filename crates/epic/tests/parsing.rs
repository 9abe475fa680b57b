// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration coverage: parsing epic files from disk the way the
//! orchestrator consumes them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use sup_core::TaskType;
use sup_epic::{parse_epic, TemplateLibrary};

const EPIC: &str = r#"# Epic 12: Port allocator hardening

Tighten allocation around the reserved ranges.

## Technical Requirements

### Storage

Allocations persist across restarts.

## Implementation Notes

1. Reject ports below 1024
2. Add a regression test for the reserved range

## Acceptance Criteria

### Behavior

- [ ] ports below 1024 are rejected
- [ ] reserved range regression test exists
"#;

#[test]
fn epic_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("epic-12.md");
    std::fs::write(&path, EPIC).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let (epic, warnings) = parse_epic(&content);
    assert!(warnings.is_empty());
    assert_eq!(epic.id, "12");
    assert_eq!(epic.implementation_notes.len(), 2);
    assert_eq!(epic.acceptance_criteria.len(), 2);
}

#[test]
fn parsed_notes_feed_epic_step_template() {
    let (epic, _) = parse_epic(EPIC);
    let library = TemplateLibrary::builtin();
    let template = library
        .select(TaskType::Implementation, "Execute epic step")
        .unwrap();

    let mut vars = HashMap::new();
    vars.insert("PROJECT_NAME".to_string(), "allocator".to_string());
    vars.insert("PROJECT_PATH".to_string(), "/projects/allocator".to_string());
    vars.insert(
        "TASK_DESCRIPTION".to_string(),
        epic.implementation_notes[0].clone(),
    );
    vars.insert("CONTEXT_JSON".to_string(), "{}".to_string());
    vars.insert(
        "CURRENT_TASK".to_string(),
        epic.implementation_notes[0].clone(),
    );
    vars.insert("COMPLETED_TASKS".to_string(), "(none)".to_string());

    let rendered = library.render(template, &vars).unwrap();
    assert!(rendered.contains("Reject ports below 1024"));
    assert!(rendered.contains("(none)"));
}
