// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

mod criteria;
mod notes;
mod round_trip;
mod sections;

pub(super) const FULL_EPIC: &str = r#"# Epic 7: Hello service

Deliver a minimal hello module with tests.

## Technical Requirements

### Runtime

Node 20, TypeScript strict mode.

### Testing

Vitest with coverage.

## Implementation Notes

1. Create src/hello.ts exporting hello()
2. Add test tests/hello.spec.ts

## Acceptance Criteria

### Files

- [ ] hello.ts exists
- [x] repo builds

### Quality

- [ ] tests pass
"#;

#[test]
fn parses_header_and_description() {
    let (epic, warnings) = parse_epic(FULL_EPIC);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(epic.id, "7");
    assert_eq!(epic.title, "Hello service");
    assert_eq!(epic.description, "Deliver a minimal hello module with tests.");
}

#[test]
fn empty_document_parses_to_empty_epic() {
    let (epic, warnings) = parse_epic("");
    assert_eq!(epic, Epic::default());
    assert!(warnings.is_empty());
}

#[test]
fn non_epic_title_warns_but_keeps_text() {
    let (epic, warnings) = parse_epic("# Just a doc\n\nbody\n");
    assert_eq!(epic.title, "Just a doc");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("title"));
}
