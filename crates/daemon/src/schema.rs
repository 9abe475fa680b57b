// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool input-schema validation.
//!
//! Tools describe their parameters with a small JSON-schema subset
//! (`type`, `properties`, `required`, `enum`, `items`). Unknown provided
//! keys pass through; type mismatches and missing required fields are
//! invalid-params errors at the RPC boundary.

use serde_json::Value;

/// Validate `params` against `schema`. Returns a human-readable reason on
/// the first violation.
pub fn validate_params(schema: &Value, params: &Value) -> Result<(), String> {
    validate_value(schema, params, "params")
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = schema_obj.get("type").and_then(Value::as_str) {
        check_type(expected, value, path)?;
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!(
                "{path} must be one of {}",
                render_enum(allowed)
            ));
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            let present = value
                .as_object()
                .is_some_and(|object| object.contains_key(name));
            if !present {
                return Err(format!("{path}.{name} is required"));
            }
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
            for (name, sub_schema) in properties {
                if let Some(sub_value) = object.get(name) {
                    validate_value(sub_schema, sub_value, &format!("{path}.{name}"))?;
                }
            }
        }
    }

    if let (Some(items_schema), Some(items)) = (schema_obj.get("items"), value.as_array()) {
        for (i, item) in items.iter().enumerate() {
            validate_value(items_schema, item, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

fn check_type(expected: &str, value: &Value, path: &str) -> Result<(), String> {
    let ok = match expected {
        "object" => value.is_object() || value.is_null(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{path} must be of type {expected}"))
    }
}

fn render_enum(allowed: &[Value]) -> String {
    allowed
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
