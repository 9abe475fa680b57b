// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encrypted secret store tools.

use super::{accessed_by, args, to_value, ToolDeps};
use crate::registry::{ToolDef, ToolError};
use serde::Deserialize;
use serde_json::{json, Value};
use sup_core::{Clock, IdGen};
use sup_storage::{SecretMeta, SecretStore};

#[derive(Deserialize)]
struct SetArgs {
    key_path: String,
    value: String,
    #[serde(default)]
    secret_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    expires_at_epoch_ms: Option<u64>,
    #[serde(default)]
    metadata: Value,
}

#[derive(Deserialize)]
struct KeyPathArgs {
    key_path: String,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    prefix: Option<String>,
}

fn store<C: Clock, G: IdGen>(deps: &ToolDeps<C, G>) -> Result<SecretStore<C>, ToolError> {
    deps.secrets
        .clone()
        .ok_or_else(|| ToolError::dependency("secret store not configured (SUP_SECRET_KEY unset)"))
}

pub(super) fn defs<C: Clock, G: IdGen>(deps: &ToolDeps<C, G>) -> Vec<ToolDef> {
    let set = {
        let d = deps.clone();
        ToolDef::new(
            "secret_set",
            "Store or replace an encrypted secret at a hierarchical key path.",
            json!({
                "type": "object",
                "properties": {
                    "key_path": { "type": "string" },
                    "value": { "type": "string" },
                    "secret_type": { "type": "string" },
                    "description": { "type": "string" },
                    "expires_at_epoch_ms": { "type": "integer" },
                    "metadata": { "type": "object" }
                },
                "required": ["key_path", "value"]
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: SetArgs = args(params)?;
                    store(&d)?.set(
                        &a.key_path,
                        &a.value,
                        &accessed_by(&ctx),
                        SecretMeta {
                            secret_type: a.secret_type,
                            description: a.description,
                            expires_at_epoch_ms: a.expires_at_epoch_ms,
                            metadata: a.metadata,
                        },
                    )?;
                    Ok(json!({ "stored": true, "key_path": a.key_path }))
                }
            },
        )
    };

    let get = {
        let d = deps.clone();
        ToolDef::new(
            "secret_get",
            "Decrypt a secret value in memory. Every access is logged.",
            json!({
                "type": "object",
                "properties": { "key_path": { "type": "string" } },
                "required": ["key_path"]
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: KeyPathArgs = args(params)?;
                    let value = store(&d)?.get(&a.key_path, &accessed_by(&ctx))?;
                    Ok(json!({ "key_path": a.key_path, "value": value }))
                }
            },
        )
    };

    let list = {
        let d = deps.clone();
        ToolDef::new(
            "secret_list",
            "List secret metadata under a path prefix. Values are never returned.",
            json!({
                "type": "object",
                "properties": { "prefix": { "type": "string" } }
            }),
            move |params, _ctx| {
                let d = d.clone();
                async move {
                    let a: ListArgs = args(params)?;
                    let secrets = store(&d)?.list(a.prefix.as_deref())?;
                    to_value(&json!({ "secrets": secrets }))
                }
            },
        )
    };

    let delete = {
        let d = deps.clone();
        ToolDef::new(
            "secret_delete",
            "Delete a secret by key path.",
            json!({
                "type": "object",
                "properties": { "key_path": { "type": "string" } },
                "required": ["key_path"]
            }),
            move |params, ctx| {
                let d = d.clone();
                async move {
                    let a: KeyPathArgs = args(params)?;
                    let deleted = store(&d)?.delete(&a.key_path, &accessed_by(&ctx))?;
                    Ok(json!({ "deleted": deleted }))
                }
            },
        )
    };

    vec![set, get, list, delete]
}
