// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration loading.
//!
//! `projects.toml` declares one `[[project]]` table per entry. Loading
//! builds an immutable [`ProjectSet`] snapshot; reload builds a fresh one
//! and in-flight requests keep whatever snapshot they started with.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use sup_core::{ErrorKind, Project, ProjectSet};
use thiserror::Error;
use tracing::{info, warn};

/// Errors loading project configuration
#[derive(Debug, Error)]
pub enum ProjectsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid project config: {0}")]
    Invalid(String),
}

impl ProjectsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectsError::Io { .. } => ErrorKind::Internal,
            ProjectsError::Toml(_) | ProjectsError::Invalid(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsFile {
    #[serde(default, rename = "project")]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    path: PathBuf,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Load the project snapshot from `path`.
///
/// A missing file is an empty registry (the meta endpoint still serves), not
/// an error.
pub fn load_projects(path: &Path) -> Result<ProjectSet, ProjectsError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no projects config; only the meta endpoint will serve");
            return Ok(ProjectSet::default());
        }
        Err(source) => {
            return Err(ProjectsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let file: ProjectsFile = toml::from_str(&content)?;
    let projects: Vec<Project> = file
        .projects
        .into_iter()
        .map(|entry| Project {
            display_name: entry.display_name.unwrap_or_else(|| entry.name.clone()),
            name: entry.name,
            path: entry.path,
            description: entry.description,
            tools: entry.tools,
            enabled: entry.enabled,
        })
        .collect();

    let set = ProjectSet::new(projects).map_err(ProjectsError::Invalid)?;
    info!(
        path = %path.display(),
        total = set.len(),
        enabled = set.enabled().count(),
        "projects loaded"
    );
    Ok(set)
}

#[cfg(test)]
#[path = "projects_tests.rs"]
mod tests;
