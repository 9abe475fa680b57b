// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Meta-endpoint-only tools: endpoint statistics and config reload.

use super::ToolDeps;
use crate::registry::{ToolDef, ToolError};
use serde_json::json;
use sup_core::{Clock, IdGen};

pub(super) fn defs<C: Clock, G: IdGen>(deps: &ToolDeps<C, G>) -> Vec<ToolDef> {
    let stats = {
        let d = deps.clone();
        ToolDef::new(
            "endpoint_stats",
            "Per-endpoint request counters plus daemon uptime.",
            json!({ "type": "object", "properties": {} }),
            move |_params, _ctx| {
                let d = d.clone();
                async move {
                    Ok(json!({
                        "uptime_seconds": d.start_time.elapsed().as_secs(),
                        "endpoints": d.stats.report(),
                    }))
                }
            },
        )
    };

    let reload = {
        let d = deps.clone();
        ToolDef::new(
            "reload_projects",
            "Rebuild the project snapshot from configuration. In-flight requests keep \
             the snapshot they started with.",
            json!({ "type": "object", "properties": {} }),
            move |_params, _ctx| {
                let d = d.clone();
                async move {
                    d.reload_tx
                        .send(())
                        .await
                        .map_err(|_| ToolError::internal("reload channel closed"))?;
                    Ok(json!({ "requested": true }))
                }
            },
        )
    };

    vec![stats, reload]
}
