// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor session (instance) records

use crate::id::InstanceId;
use serde::{Deserialize, Serialize};

/// Milliseconds without a heartbeat before an active instance counts as stale.
pub const STALE_AFTER_MS: u64 = 120_000;

/// Kind of supervisor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceType {
    #[serde(rename = "PS")]
    Ps,
    #[serde(rename = "MS")]
    Ms,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Ps => "PS",
            InstanceType::Ms => "MS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PS" => Some(InstanceType::Ps),
            "MS" => Some(InstanceType::Ms),
            _ => None,
        }
    }
}

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Stale,
    Closed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Stale => "stale",
            InstanceStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(InstanceStatus::Active),
            "stale" => Some(InstanceStatus::Stale),
            "closed" => Some(InstanceStatus::Closed),
            _ => None,
        }
    }
}

/// A registered supervisor session.
///
/// Owns an append-only event stream, a command audit log, and any
/// checkpoints. `status == Closed` iff `closed_at` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub project: String,
    pub instance_type: InstanceType,
    pub status: InstanceStatus,
    /// Context window usage, 0..=100
    pub context_percent: u8,
    pub current_epic: Option<String>,
    pub host_machine: Option<String>,
    pub created_at_epoch_ms: u64,
    pub last_heartbeat_epoch_ms: u64,
    pub closed_at_epoch_ms: Option<u64>,
}

impl Instance {
    pub fn is_closed(&self) -> bool {
        self.status == InstanceStatus::Closed
    }

    /// Whether this instance would be considered stale at `now`.
    ///
    /// Closed instances are never stale; everything else is stale once the
    /// last heartbeat is older than [`STALE_AFTER_MS`].
    pub fn is_stale_at(&self, now_epoch_ms: u64) -> bool {
        !self.is_closed()
            && now_epoch_ms.saturating_sub(self.last_heartbeat_epoch_ms) > STALE_AFTER_MS
    }

    /// Seconds since the last heartbeat at `now`.
    pub fn age_seconds_at(&self, now_epoch_ms: u64) -> u64 {
        now_epoch_ms.saturating_sub(self.last_heartbeat_epoch_ms) / 1000
    }
}

/// Listing row: instance fields plus derived age and staleness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceListItem {
    #[serde(flatten)]
    pub instance: Instance,
    pub age_seconds: u64,
    pub stale: bool,
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
