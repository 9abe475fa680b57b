// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn spawn_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "task_type": {
                "type": "string",
                "enum": ["implementation", "validation", "fix"]
            },
            "description": { "type": "string" },
            "estimated_tokens": { "type": "integer" },
            "context": { "type": "object" },
            "tags": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["task_type", "description"]
    })
}

#[test]
fn valid_params_pass() {
    let params = json!({
        "task_type": "implementation",
        "description": "build it",
        "estimated_tokens": 5000,
        "context": {"project_path": "/p"},
        "tags": ["a", "b"]
    });
    validate_params(&spawn_schema(), &params).unwrap();
}

#[test]
fn unknown_extra_keys_are_allowed() {
    let params = json!({
        "task_type": "fix",
        "description": "x",
        "something_new": 42
    });
    validate_params(&spawn_schema(), &params).unwrap();
}

#[parameterized(
    missing_required = { json!({"task_type": "fix"}), "description is required" },
    wrong_type = { json!({"task_type": "fix", "description": 5}), "must be of type string" },
    bad_enum = { json!({"task_type": "refactor", "description": "x"}), "must be one of" },
    float_for_integer = { json!({"task_type": "fix", "description": "x", "estimated_tokens": 1.5}), "type integer" },
    bad_array_item = { json!({"task_type": "fix", "description": "x", "tags": ["a", 1]}), "tags[1]" },
    null_with_required = { Value::Null, "is required" },
)]
fn invalid_params_fail(params: Value, expected_fragment: &str) {
    let err = validate_params(&spawn_schema(), &params).unwrap_err();
    assert!(
        err.contains(expected_fragment),
        "expected {expected_fragment:?} in {err:?}"
    );
}

#[test]
fn null_params_pass_when_nothing_is_required() {
    let schema = json!({"type": "object", "properties": {}});
    validate_params(&schema, &Value::Null).unwrap();
}

#[test]
fn schemaless_tools_accept_anything() {
    validate_params(&Value::Null, &json!({"whatever": true})).unwrap();
}
