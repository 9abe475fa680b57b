// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn technical_requirements_keep_subsections_in_order() {
    let (epic, _) = parse_epic(FULL_EPIC);
    let keys: Vec<&String> = epic.technical_requirements.keys().collect();
    assert_eq!(keys, vec!["Runtime", "Testing"]);
    assert!(epic.technical_requirements["Runtime"].contains("Node 20"));
}

#[test]
fn technical_requirements_keep_fenced_code() {
    let doc = "## Technical Requirements\n\n### Build\n\n```sh\nnpm ci\n```\n";
    let (epic, _) = parse_epic(doc);
    assert!(epic.technical_requirements["Build"].contains("```sh\nnpm ci\n```"));
}

#[test]
fn duplicate_sections_concatenate_in_document_order() {
    let doc = "\
## Implementation Notes

1. first

## Acceptance Criteria

- [ ] a

## Implementation Notes

2. second
";
    let (epic, _) = parse_epic(doc);
    assert_eq!(epic.implementation_notes, vec!["first", "second"]);
    assert_eq!(epic.acceptance_criteria.len(), 1);
}

#[test]
fn unknown_sections_are_ignored() {
    let doc = "## Rollout Plan\n\n1. not a note\n\n## Implementation Notes\n\n1. real note\n";
    let (epic, _) = parse_epic(doc);
    assert_eq!(epic.implementation_notes, vec!["real note"]);
}
