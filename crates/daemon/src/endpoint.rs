// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One MCP endpoint: a Unix socket speaking newline-delimited JSON-RPC 2.0.
//!
//! The socket path fixes the `ProjectContext` for every request on it.
//! Handlers read the project snapshot once per request, so a config reload
//! affects new requests only.

use crate::registry::{ExecuteError, ToolCtx, ToolRegistry};
use crate::rpc::{Request, Response, RpcError};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sup_core::{Clock, CommandEntry, InstanceId, Project};
use sup_storage::EventStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

/// MCP protocol revision this endpoint speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-endpoint request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
}

pub type SharedStats = Arc<Mutex<EndpointStats>>;

/// Registry of live endpoints and their counters, consumed by the meta
/// `endpoint_stats` tool.
#[derive(Clone, Default)]
pub struct StatsHub {
    inner: Arc<Mutex<BTreeMap<String, (PathBuf, SharedStats)>>>,
}

/// One row of the stats report.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatsRow {
    pub project: String,
    pub socket_path: PathBuf,
    #[serde(flatten)]
    pub stats: EndpointStats,
}

impl StatsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, project: &str, socket_path: PathBuf) -> SharedStats {
        let stats = SharedStats::default();
        self.inner
            .lock()
            .insert(project.to_string(), (socket_path, stats.clone()));
        stats
    }

    pub fn detach(&self, project: &str) {
        self.inner.lock().remove(project);
    }

    pub fn report(&self) -> Vec<EndpointStatsRow> {
        self.inner
            .lock()
            .iter()
            .map(|(project, (socket_path, stats))| EndpointStatsRow {
                project: project.clone(),
                socket_path: socket_path.clone(),
                stats: *stats.lock(),
            })
            .collect()
    }
}

/// State shared by all endpoints of the multiplexer.
pub struct EndpointShared<C: Clock> {
    pub registry: Arc<ToolRegistry>,
    /// Command-audit sink (per-request logging)
    pub events: EventStore<C>,
    pub server_version: &'static str,
}

/// Handle one wire line. `None` means no response is owed (notification).
pub async fn handle_line<C: Clock>(
    line: &str,
    project: &Arc<Project>,
    shared: &EndpointShared<C>,
    stats: &SharedStats,
) -> Option<String> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            count(stats, false);
            return Some(Response::error(None, RpcError::parse_error(e.to_string())).to_line());
        }
    };
    if let Err(e) = request.validate() {
        count(stats, false);
        return Some(Response::error(request.id, e).to_line());
    }

    let id = request.id.clone();
    let notification = request.is_notification();
    let result = dispatch(&request, project, shared).await;

    count(stats, result.is_ok());
    if notification {
        return None;
    }
    Some(match result {
        Ok(value) => Response::result(id, value).to_line(),
        Err(e) => Response::error(id, e).to_line(),
    })
}

async fn dispatch<C: Clock>(
    request: &Request,
    project: &Arc<Project>,
    shared: &EndpointShared<C>,
) -> Result<Value, RpcError> {
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": format!("supervisor-{}", project.name),
                "version": shared.server_version,
            },
            "project": {
                "name": project.name,
                "displayName": project.display_name,
                "description": project.description,
            },
        })),
        "ping" => Ok(json!({ "ok": true })),
        "tools/list" => Ok(json!({
            "tools": shared.registry.list_tools(project),
        })),
        "tools/call" => handle_tool_call(request, project, shared).await,
        other => Err(RpcError::method_not_found(other)),
    }
}

async fn handle_tool_call<C: Clock>(
    request: &Request,
    project: &Arc<Project>,
    shared: &EndpointShared<C>,
) -> Result<Value, RpcError> {
    let name = request
        .params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("params.name is required"))?
        .to_string();
    let arguments = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    let instance_id = match arguments.get("instance_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(InstanceId::new(s.clone())),
        Some(_) => {
            return Err(RpcError::invalid_params(
                "arguments.instance_id must be a string",
            ))
        }
    };
    // Optional cooperative client deadline
    let deadline = arguments
        .get("deadline_ms")
        .and_then(Value::as_u64)
        .map(Duration::from_millis);

    let ctx = ToolCtx {
        project: Arc::clone(project),
        instance_id: instance_id.clone(),
    };

    let start = Instant::now();
    let call = shared.registry.execute(&name, arguments.clone(), ctx);
    let outcome = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, call).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(ExecuteError::Tool(crate::registry::ToolError::new(
                sup_core::ErrorKind::Timeout,
                format!("client deadline of {deadline:?} expired"),
            ))),
        },
        None => call.await,
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    log_request(
        shared,
        instance_id.as_ref(),
        &name,
        arguments,
        &outcome,
        duration_ms,
    );

    outcome.map_err(|e| match e {
        ExecuteError::OutOfScope(name) => RpcError::method_not_found(&name),
        ExecuteError::InvalidParams(reason) => RpcError::invalid_params(reason),
        ExecuteError::Tool(e) => RpcError::from_kind(e.kind, e.message),
    })
}

/// Persist the request as a command-log entry against the caller's instance
/// or the anonymous sink.
fn log_request<C: Clock>(
    shared: &EndpointShared<C>,
    instance_id: Option<&InstanceId>,
    tool_name: &str,
    arguments: Value,
    outcome: &Result<Value, ExecuteError>,
    duration_ms: u64,
) {
    let mut entry = CommandEntry::tool_call(tool_name, arguments).with_duration_ms(duration_ms);
    match outcome {
        Ok(result) => entry = entry.with_result(result.clone()),
        Err(e) => entry = entry.failed(e.to_string()),
    }

    // Unknown instances fall back to the anonymous sink rather than failing
    // the request after the tool already ran
    let logged = match shared.events.log_command(instance_id, entry.clone()) {
        Ok(_) => true,
        Err(e) if instance_id.is_some() => {
            debug!(error = %e, "instance attribution failed, logging to sink");
            shared.events.log_command(None, entry).is_ok()
        }
        Err(_) => false,
    };
    if !logged {
        warn!(tool = tool_name, "request could not be recorded");
    }
}

fn count(stats: &SharedStats, success: bool) {
    let mut stats = stats.lock();
    stats.total += 1;
    if success {
        stats.success += 1;
    } else {
        stats.error += 1;
    }
}

/// Accept loop for one endpoint socket.
///
/// The project cell is re-read per request so reloads swap cleanly.
pub async fn serve<C: Clock>(
    listener: UnixListener,
    project: Arc<Mutex<Arc<Project>>>,
    shared: Arc<EndpointShared<C>>,
    stats: SharedStats,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let project = Arc::clone(&project);
                let shared = Arc::clone(&shared);
                let stats = stats.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_conn(stream, project, shared, stats).await {
                        debug!(error = %e, "endpoint connection ended with error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "endpoint accept failed");
            }
        }
    }
}

async fn handle_conn<C: Clock>(
    stream: UnixStream,
    project: Arc<Mutex<Arc<Project>>>,
    shared: Arc<EndpointShared<C>>,
    stats: SharedStats,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // Snapshot the project per request; in-flight requests keep theirs
        let snapshot = project.lock().clone();
        if let Some(response) = handle_line(&line, &snapshot, &shared, &stats).await {
            write_half.write_all(response.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
