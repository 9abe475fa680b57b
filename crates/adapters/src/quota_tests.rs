// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn no_probe_path_is_available() {
    assert!(probe_file(None).available);
}

#[test]
fn missing_file_is_available() {
    let dir = tempfile::tempdir().unwrap();
    assert!(probe_file(Some(&dir.path().join("claude.json"))).available);
}

#[test]
fn exhausted_probe_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claude.json");
    std::fs::write(&path, r#"{"available": false, "reason": "rate limited"}"#).unwrap();
    let status = probe_file(Some(&path));
    assert!(!status.available);
    assert_eq!(status.reason.as_deref(), Some("rate limited"));
}

#[test]
fn available_probe_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gemini.json");
    std::fs::write(&path, r#"{"available": true}"#).unwrap();
    assert!(probe_file(Some(&path)).available);
}

#[test]
fn malformed_probe_counts_as_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codex.json");
    std::fs::write(&path, "not json at all").unwrap();
    let status = probe_file(Some(&path));
    assert!(!status.available);
    assert!(status.reason.unwrap().contains("malformed"));
}
