// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project definitions and the immutable project snapshot

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the implicit meta project, always enabled.
pub const META_PROJECT: &str = "meta";

/// A registered project: the unit of endpoint scoping and working-directory
/// isolation. Immutable during a run; reload builds a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique slug (`[a-z0-9-]+`)
    pub name: String,
    pub display_name: String,
    /// Absolute filesystem path of the project working tree
    pub path: PathBuf,
    #[serde(default)]
    pub description: String,
    /// Tool names visible on this project's endpoint; empty = unrestricted
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Project {
    /// Whether a string is a valid project slug.
    pub fn is_valid_slug(s: &str) -> bool {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// The synthesized meta project rooted at the service state dir.
    pub fn meta(state_dir: &Path) -> Self {
        Self {
            name: META_PROJECT.to_string(),
            display_name: "Supervisor Meta".to_string(),
            path: state_dir.to_path_buf(),
            description: "Cross-project supervisor surface".to_string(),
            tools: Vec::new(),
            enabled: true,
        }
    }
}

/// Immutable snapshot of the registered projects.
///
/// Handlers hold `Arc<Project>` clones; a reload swaps the whole set while
/// in-flight requests keep the snapshot they started with.
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    projects: Vec<Arc<Project>>,
}

impl ProjectSet {
    pub fn new(projects: Vec<Project>) -> Result<Self, String> {
        let mut seen = std::collections::HashSet::new();
        for p in &projects {
            if !Project::is_valid_slug(&p.name) {
                return Err(format!("invalid project slug: {:?}", p.name));
            }
            if p.name == META_PROJECT {
                return Err("project name \"meta\" is reserved".to_string());
            }
            if !p.path.is_absolute() {
                return Err(format!(
                    "project {} path must be absolute: {}",
                    p.name,
                    p.path.display()
                ));
            }
            if !seen.insert(p.name.clone()) {
                return Err(format!("duplicate project name: {}", p.name));
            }
        }
        Ok(Self {
            projects: projects.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Project>> {
        self.projects.iter().find(|p| p.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.projects.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.projects.iter().filter(|p| p.enabled)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
