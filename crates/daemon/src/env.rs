// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Handler code never reads the environment; everything is resolved here
//! once during lifecycle startup.

use crate::lifecycle::LifecycleError;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve state directory: SUP_STATE_DIR > XDG_STATE_HOME/sup > ~/.local/state/sup
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SUP_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sup"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/sup"))
}

/// Database path override
pub fn db_path() -> Option<PathBuf> {
    std::env::var("SUP_DB_PATH").ok().map(PathBuf::from)
}

/// Projects config path override
pub fn projects_path() -> Option<PathBuf> {
    std::env::var("SUP_PROJECTS_FILE").ok().map(PathBuf::from)
}

/// Health sweep interval override
pub fn sweep_interval() -> Option<Duration> {
    std::env::var("SUP_SWEEP_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Quota probe directory override
pub fn quota_dir() -> Option<PathBuf> {
    std::env::var("SUP_QUOTA_DIR").ok().map(PathBuf::from)
}

/// Directory for agent instruction/output files
pub fn agents_dir() -> PathBuf {
    std::env::var("SUP_AGENTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("sup-agents"))
}

/// Secret-store key: `SUP_SECRET_KEY` is 64 hex chars (32 bytes);
/// `SUP_SECRET_KEY_ID` names the key for rotation bookkeeping.
///
/// Returns `None` when no key is configured; the secret tools then report
/// the store as unavailable instead of running unencrypted.
pub fn secret_key() -> Result<Option<([u8; 32], String)>, LifecycleError> {
    let Ok(hex) = std::env::var("SUP_SECRET_KEY") else {
        return Ok(None);
    };
    let bytes = decode_hex(hex.trim()).ok_or_else(|| {
        LifecycleError::Config("SUP_SECRET_KEY must be 64 hex characters".to_string())
    })?;
    let key_id = std::env::var("SUP_SECRET_KEY_ID").unwrap_or_else(|_| "primary".to_string());
    Ok(Some((bytes, key_id)))
}

fn decode_hex(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Some(out)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
