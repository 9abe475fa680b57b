// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP multiplexer: one endpoint socket per enabled project plus meta.
//!
//! Sockets live under `{state_dir}/endpoints/{project}.sock`. Reload diffs
//! the new snapshot against the running endpoints: removed projects are
//! torn down, added ones bound, and changed ones swap their project cell so
//! only new requests see the change.

use crate::endpoint::{self, EndpointShared, SharedStats, StatsHub};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use sup_core::{Clock, Project, ProjectSet};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct EndpointHandle {
    project: Arc<Mutex<Arc<Project>>>,
    socket_path: PathBuf,
    #[allow(dead_code)]
    stats: SharedStats,
    task: JoinHandle<()>,
}

/// Hosts and supervises the per-project endpoints.
pub struct Multiplexer<C: Clock> {
    shared: Arc<EndpointShared<C>>,
    hub: StatsHub,
    endpoints_dir: PathBuf,
    meta: Arc<Project>,
    endpoints: Mutex<BTreeMap<String, EndpointHandle>>,
}

impl<C: Clock> Multiplexer<C> {
    pub fn new(
        shared: Arc<EndpointShared<C>>,
        hub: StatsHub,
        endpoints_dir: PathBuf,
        state_dir: &std::path::Path,
    ) -> Self {
        Self {
            shared,
            hub,
            endpoints_dir,
            meta: Arc::new(Project::meta(state_dir)),
            endpoints: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn stats_hub(&self) -> StatsHub {
        self.hub.clone()
    }

    /// Bind every enabled project endpoint plus meta.
    pub fn start(&self, snapshot: &ProjectSet) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.endpoints_dir)?;
        self.bind(Arc::clone(&self.meta))?;
        for project in snapshot.enabled() {
            self.bind(Arc::clone(project))?;
        }
        Ok(())
    }

    /// Apply a new project snapshot.
    ///
    /// In-flight requests keep the snapshot they started with; new requests
    /// on surviving endpoints see the new one.
    pub fn reload(&self, snapshot: &ProjectSet) -> std::io::Result<()> {
        let desired: BTreeMap<String, Arc<Project>> = snapshot
            .enabled()
            .map(|p| (p.name.clone(), Arc::clone(p)))
            .collect();

        let mut removed = Vec::new();
        {
            let endpoints = self.endpoints.lock();
            for name in endpoints.keys() {
                if name != &self.meta.name && !desired.contains_key(name) {
                    removed.push(name.clone());
                }
            }
        }
        for name in removed {
            self.teardown(&name);
        }

        for (name, project) in desired {
            let existing = {
                let endpoints = self.endpoints.lock();
                endpoints.get(&name).map(|h| Arc::clone(&h.project))
            };
            match existing {
                Some(cell) => {
                    *cell.lock() = project;
                }
                None => {
                    self.bind(project)?;
                }
            }
        }
        info!("project snapshot reloaded");
        Ok(())
    }

    /// Tear down every endpoint and remove socket files.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.endpoints.lock().keys().cloned().collect();
        for name in names {
            self.teardown(&name);
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn socket_path(&self, project: &str) -> PathBuf {
        self.endpoints_dir.join(format!("{project}.sock"))
    }

    fn bind(&self, project: Arc<Project>) -> std::io::Result<()> {
        let socket_path = self.socket_path(&project.name);
        // Stale socket from an unclean shutdown
        let _ = std::fs::remove_file(&socket_path);
        let listener = UnixListener::bind(&socket_path)?;

        let stats = self.hub.attach(&project.name, socket_path.clone());
        let name = project.name.clone();
        let cell = Arc::new(Mutex::new(project));
        let task = tokio::spawn(endpoint::serve(
            listener,
            Arc::clone(&cell),
            Arc::clone(&self.shared),
            stats.clone(),
        ));

        info!(project = %name, socket = %socket_path.display(), "endpoint bound");
        self.endpoints.lock().insert(
            name,
            EndpointHandle {
                project: cell,
                socket_path,
                stats,
                task,
            },
        );
        Ok(())
    }

    fn teardown(&self, name: &str) {
        let Some(handle) = self.endpoints.lock().remove(name) else {
            return;
        };
        handle.task.abort();
        self.hub.detach(name);
        if let Err(e) = std::fs::remove_file(&handle.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(project = name, error = %e, "could not remove endpoint socket");
            }
        }
        info!(project = name, "endpoint removed");
    }
}

impl<C: Clock> Drop for Multiplexer<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
