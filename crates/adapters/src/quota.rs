// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quota probe files.
//!
//! Operators (or wrapper scripts that watch CLI rate-limit output) drop a
//! JSON file per service: `{"available": false, "reason": "…"}`. A missing
//! file means the service is usable; an unreadable one counts as exhausted
//! so a broken probe never routes work into a wall.

use crate::cli::QuotaStatus;
use std::path::Path;
use tracing::warn;

/// Read a quota probe file. `None` or a missing file ⇒ available.
pub fn probe_file(path: Option<&Path>) -> QuotaStatus {
    let Some(path) = path else {
        return QuotaStatus::available();
    };
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return QuotaStatus::available();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "quota probe unreadable");
            return QuotaStatus::exhausted(format!("quota probe unreadable: {e}"));
        }
    };
    match serde_json::from_str::<QuotaStatus>(&content) {
        Ok(status) => status,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "quota probe malformed");
            QuotaStatus::exhausted(format!("quota probe malformed: {e}"))
        }
    }
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod tests;
