// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use sup_adapters::AdapterError;
use sup_core::ErrorKind;
use sup_epic::TemplateError;
use sup_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("no project context: supply context.project_path or call through a project endpoint")]
    NoProjectContext,
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NoProjectContext => ErrorKind::NoProjectContext,
            EngineError::QuotaExhausted(_) => ErrorKind::QuotaExhausted,
            EngineError::Template(e) => e.kind(),
            EngineError::Storage(e) => e.kind(),
            EngineError::Adapter(e) => e.kind(),
            EngineError::Io(_) => ErrorKind::AdapterIo,
            EngineError::Serde(_) => ErrorKind::Internal,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }
}
