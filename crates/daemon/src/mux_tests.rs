// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::{ToolDef, ToolRegistry};
use serde_json::Value;
use sup_core::FakeClock;
use sup_storage::{EventStore, Gateway};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

fn project(name: &str, display: &str) -> Project {
    Project {
        name: name.to_string(),
        display_name: display.to_string(),
        path: PathBuf::from("/projects").join(name),
        description: String::new(),
        tools: Vec::new(),
        enabled: true,
    }
}

fn build_mux(dir: &std::path::Path) -> Multiplexer<FakeClock> {
    let gateway = Gateway::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register_tool(ToolDef::new(
            "whoami",
            "reports the endpoint project",
            serde_json::json!({"type": "object"}),
            |_params, ctx| async move {
                Ok(serde_json::json!({ "project": ctx.project.name, "path": ctx.project.path }))
            },
        ))
        .unwrap();
    let shared = Arc::new(EndpointShared {
        registry,
        events: EventStore::new(gateway, clock),
        server_version: "test",
    });
    Multiplexer::new(shared, StatsHub::new(), dir.join("endpoints"), dir)
}

async fn rpc(socket: &PathBuf, line: &str) -> Value {
    let stream = UnixStream::connect(socket).await.unwrap();
    let (read, mut write) = stream.into_split();
    write.write_all(line.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();
    let mut lines = BufReader::new(read).lines();
    let response = lines.next_line().await.unwrap().unwrap();
    serde_json::from_str(&response).unwrap()
}

#[tokio::test]
async fn start_binds_meta_and_enabled_projects() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    let mut disabled = project("dark", "Dark");
    disabled.enabled = false;
    let snapshot =
        ProjectSet::new(vec![project("consilio", "Consilio"), disabled]).unwrap();
    mux.start(&snapshot).unwrap();

    assert_eq!(mux.endpoint_count(), 2); // meta + consilio
    assert!(mux.socket_path("meta").exists());
    assert!(mux.socket_path("consilio").exists());
    assert!(!mux.socket_path("dark").exists());
}

#[tokio::test]
async fn each_endpoint_carries_its_own_project_context() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    let snapshot = ProjectSet::new(vec![
        project("alpha", "Alpha"),
        project("beta", "Beta"),
    ])
    .unwrap();
    mux.start(&snapshot).unwrap();

    let call = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"whoami","arguments":{}}}"#;
    let alpha = rpc(&mux.socket_path("alpha"), call).await;
    assert_eq!(alpha["result"]["project"], "alpha");
    assert_eq!(alpha["result"]["path"], "/projects/alpha");

    let beta = rpc(&mux.socket_path("beta"), call).await;
    assert_eq!(beta["result"]["project"], "beta");
}

#[tokio::test]
async fn initialize_reflects_endpoint_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    let snapshot = ProjectSet::new(vec![project("alpha", "Alpha")]).unwrap();
    mux.start(&snapshot).unwrap();

    let resp = rpc(
        &mux.socket_path("alpha"),
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
    )
    .await;
    assert_eq!(resp["result"]["serverInfo"]["name"], "supervisor-alpha");

    let resp = rpc(
        &mux.socket_path("meta"),
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
    )
    .await;
    assert_eq!(resp["result"]["serverInfo"]["name"], "supervisor-meta");
}

#[tokio::test]
async fn reload_adds_removes_and_swaps_projects() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    mux.start(&ProjectSet::new(vec![project("alpha", "Alpha")]).unwrap())
        .unwrap();

    // alpha renamed display, beta added, via a new snapshot
    let mut renamed = project("alpha", "Alpha v2");
    renamed.path = PathBuf::from("/projects/alpha-v2");
    let snapshot = ProjectSet::new(vec![renamed, project("beta", "Beta")]).unwrap();
    mux.reload(&snapshot).unwrap();

    assert_eq!(mux.endpoint_count(), 3);
    let call = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"whoami","arguments":{}}}"#;
    let alpha = rpc(&mux.socket_path("alpha"), call).await;
    assert_eq!(alpha["result"]["path"], "/projects/alpha-v2");
    let beta = rpc(&mux.socket_path("beta"), call).await;
    assert_eq!(beta["result"]["project"], "beta");

    // Drop beta again
    mux.reload(&ProjectSet::new(vec![project("alpha", "Alpha")]).unwrap())
        .unwrap();
    assert_eq!(mux.endpoint_count(), 2);
    assert!(!mux.socket_path("beta").exists());
}

#[tokio::test]
async fn stats_hub_sees_per_endpoint_counters() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    mux.start(&ProjectSet::new(vec![project("alpha", "Alpha")]).unwrap())
        .unwrap();

    rpc(
        &mux.socket_path("alpha"),
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
    )
    .await;
    rpc(
        &mux.socket_path("alpha"),
        r#"{"jsonrpc":"2.0","id":2,"method":"nope"}"#,
    )
    .await;

    let report = mux.stats_hub().report();
    let alpha = report.iter().find(|r| r.project == "alpha").unwrap();
    assert_eq!(alpha.stats.total, 2);
    assert_eq!(alpha.stats.success, 1);
    assert_eq!(alpha.stats.error, 1);
}

#[tokio::test]
async fn shutdown_removes_socket_files() {
    let dir = tempfile::tempdir().unwrap();
    let mux = build_mux(dir.path());
    mux.start(&ProjectSet::new(vec![project("alpha", "Alpha")]).unwrap())
        .unwrap();
    let socket = mux.socket_path("alpha");
    assert!(socket.exists());
    mux.shutdown();
    assert!(!socket.exists());
    assert_eq!(mux.endpoint_count(), 0);
}
