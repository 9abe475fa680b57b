// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy.
//!
//! Every crate keeps its own `thiserror` enum; each exposes `kind()` so the
//! RPC boundary can translate any failure into a stable wire-level kind
//! without knowing the concrete error type.

use serde::{Deserialize, Serialize};

/// Wire-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input violates schema or invariants
    Validation,
    /// Identifier does not resolve
    NotFound,
    /// Unique/state violation (e.g. closed instance)
    Conflict,
    /// No routable backend available
    QuotaExhausted,
    /// Spawn invoked without resolvable working directory
    NoProjectContext,
    TemplateNotFound,
    TemplateRender,
    /// CLI adapter exited non-zero
    AdapterExit,
    AdapterIo,
    Timeout,
    Cancelled,
    /// External infra helper failed
    DependencyFailure,
    /// Unexpected; logged with detail
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::QuotaExhausted => "quota_exhausted",
            ErrorKind::NoProjectContext => "no_project_context",
            ErrorKind::TemplateNotFound => "template_not_found",
            ErrorKind::TemplateRender => "template_render",
            ErrorKind::AdapterExit => "adapter_exit",
            ErrorKind::AdapterIo => "adapter_io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DependencyFailure => "dependency_failure",
            ErrorKind::Internal => "internal",
        }
    }

    /// JSON-RPC error code for this kind.
    ///
    /// Validation maps to the standard invalid-params code; everything else
    /// is an application error carrying the kind in `data.kind`.
    pub fn rpc_code(&self) -> i64 {
        match self {
            ErrorKind::Validation => -32602,
            _ => -32000,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
