// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool registry with per-project scoping.
//!
//! Tools are registered globally; each project endpoint sees a scoped
//! subset. The meta endpoint sees everything. Dispatch validates scope
//! first (out-of-scope is indistinguishable from unknown), then params
//! against the tool's input schema, then invokes the handler.

use crate::schema::validate_params;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use sup_core::{ErrorKind, InstanceId, Project, META_PROJECT};
use sup_engine::EngineError;
use sup_storage::StorageError;
use thiserror::Error;
use tracing::debug;

/// Context handed to every tool handler.
///
/// The project is the endpoint's snapshot at request start; handlers treat
/// it as read-only and never fall back to process-global state.
#[derive(Clone)]
pub struct ToolCtx {
    pub project: Arc<Project>,
    pub instance_id: Option<InstanceId>,
}

/// A failed tool invocation, classified by the shared taxonomy.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DependencyFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<StorageError> for ToolError {
    fn from(e: StorageError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<EngineError> for ToolError {
    fn from(e: EngineError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;
pub type ToolHandler = Arc<dyn Fn(Value, ToolCtx) -> ToolFuture + Send + Sync>;

/// A registered tool.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

impl ToolDef {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, ToolCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |params, ctx| Box::pin(handler(params, ctx))),
        }
    }
}

/// Listing row for `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Dispatch failure, split so the endpoint can map JSON-RPC codes.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Unknown tool or not visible on this endpoint → −32601
    #[error("tool not available: {0}")]
    OutOfScope(String),
    /// Input schema violation → −32602
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// Handler failure → application error with kind
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Global tool definitions plus per-project visibility.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, ToolDef>>,
    scopes: RwLock<HashMap<String, Vec<String>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global tool definition. Duplicate names are a conflict.
    pub fn register_tool(&self, def: ToolDef) -> Result<(), ToolError> {
        let mut tools = self.tools.write();
        if tools.contains_key(&def.name) {
            return Err(ToolError::new(
                ErrorKind::Conflict,
                format!("tool {} already registered", def.name),
            ));
        }
        debug!(tool = %def.name, "tool registered");
        tools.insert(def.name.clone(), def);
        Ok(())
    }

    /// Restrict which tools a project endpoint sees. Unknown names are
    /// ignored at lookup time; an empty list hides everything.
    pub fn set_project_tools(&self, project: &str, names: Vec<String>) {
        self.scopes.write().insert(project.to_string(), names);
    }

    /// Names of every registered tool, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Visible tools for an endpoint, sorted by name.
    pub fn list_tools(&self, project: &Project) -> Vec<ToolInfo> {
        let names = self.visible_names(project);
        let tools = self.tools.read();
        names
            .into_iter()
            .filter_map(|name| tools.get(&name))
            .map(|def| ToolInfo {
                name: def.name.clone(),
                description: def.description.clone(),
                input_schema: def.input_schema.clone(),
            })
            .collect()
    }

    /// Dispatch one call for an endpoint.
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        ctx: ToolCtx,
    ) -> Result<Value, ExecuteError> {
        if !self.visible_names(&ctx.project).iter().any(|n| n == name) {
            return Err(ExecuteError::OutOfScope(name.to_string()));
        }
        let def = self
            .tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ExecuteError::OutOfScope(name.to_string()))?;

        validate_params(&def.input_schema, &params).map_err(ExecuteError::InvalidParams)?;
        let result = (def.handler)(params, ctx).await?;
        Ok(result)
    }

    fn visible_names(&self, project: &Project) -> Vec<String> {
        let tools = self.tools.read();
        if project.name == META_PROJECT {
            return tools.keys().cloned().collect();
        }
        match self.scopes.read().get(&project.name) {
            Some(names) => names
                .iter()
                .filter(|n| tools.contains_key(*n))
                .cloned()
                .collect(),
            None => tools.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
