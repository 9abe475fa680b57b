// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn criteria_grouped_by_nearest_heading() {
    let (epic, _) = parse_epic(FULL_EPIC);
    let sections: Vec<(&str, &str, bool)> = epic
        .acceptance_criteria
        .iter()
        .map(|c| (c.section.as_str(), c.text.as_str(), c.met))
        .collect();
    assert_eq!(
        sections,
        vec![
            ("Files", "hello.ts exists", false),
            ("Files", "repo builds", true),
            ("Quality", "tests pass", false),
        ]
    );
}

#[test]
fn ungrouped_criteria_default_to_general() {
    let doc = "## Acceptance Criteria\n\n- [ ] standalone item\n";
    let (epic, _) = parse_epic(doc);
    assert_eq!(epic.acceptance_criteria.len(), 1);
    assert_eq!(epic.acceptance_criteria[0].section, "General");
}

#[test]
fn malformed_checkboxes_are_skipped_with_warnings() {
    let doc = "## Acceptance Criteria\n\n- [ ] good one\n- [y] bad marker\n- [] missing space\n";
    let (epic, warnings) = parse_epic(doc);
    assert_eq!(epic.acceptance_criteria.len(), 1);
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.message.contains("malformed")));
    assert_eq!(warnings[0].line, 4);
}

#[test]
fn uppercase_x_counts_as_met() {
    let doc = "## Acceptance Criteria\n\n- [X] shouty\n";
    let (epic, _) = parse_epic(doc);
    assert!(epic.acceptance_criteria[0].met);
}

#[test]
fn prose_between_criteria_is_ignored() {
    let doc = "## Acceptance Criteria\n\nsome prose\n\n- [ ] item\n";
    let (epic, warnings) = parse_epic(doc);
    assert_eq!(epic.acceptance_criteria.len(), 1);
    assert!(warnings.is_empty());
}
