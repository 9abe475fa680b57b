// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event and audit record types.
//!
//! Event types form a closed set: anything outside the enum is rejected at
//! the tool boundary. Payloads are free-form JSON (`event_data`/`metadata`)
//! because consumers reconstruct session state from them generically.

use crate::id::InstanceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of event types recorded against an instance stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // -- instance lifecycle --
    InstanceRegistered,
    InstanceHeartbeat,
    InstanceStale,
    InstanceClosed,

    // -- epic milestones --
    EpicStarted,
    EpicPlanned,
    EpicCompleted,
    EpicFailed,

    // -- test / validation outcomes --
    TestStarted,
    TestPassed,
    TestFailed,
    ValidationPassed,
    ValidationFailed,

    // -- git / PR / deploy transitions --
    CommitCreated,
    PrCreated,
    PrMerged,
    DeploymentStarted,
    DeploymentCompleted,
    DeploymentFailed,

    // -- session bookkeeping --
    ContextWindowUpdated,
    CheckpointCreated,
    CheckpointLoaded,
    FeatureRequested,
    TaskSpawned,
}

impl EventType {
    pub const ALL: [EventType; 24] = [
        EventType::InstanceRegistered,
        EventType::InstanceHeartbeat,
        EventType::InstanceStale,
        EventType::InstanceClosed,
        EventType::EpicStarted,
        EventType::EpicPlanned,
        EventType::EpicCompleted,
        EventType::EpicFailed,
        EventType::TestStarted,
        EventType::TestPassed,
        EventType::TestFailed,
        EventType::ValidationPassed,
        EventType::ValidationFailed,
        EventType::CommitCreated,
        EventType::PrCreated,
        EventType::PrMerged,
        EventType::DeploymentStarted,
        EventType::DeploymentCompleted,
        EventType::DeploymentFailed,
        EventType::ContextWindowUpdated,
        EventType::CheckpointCreated,
        EventType::CheckpointLoaded,
        EventType::FeatureRequested,
        EventType::TaskSpawned,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventType::InstanceRegistered => "instance_registered",
            EventType::InstanceHeartbeat => "instance_heartbeat",
            EventType::InstanceStale => "instance_stale",
            EventType::InstanceClosed => "instance_closed",
            EventType::EpicStarted => "epic_started",
            EventType::EpicPlanned => "epic_planned",
            EventType::EpicCompleted => "epic_completed",
            EventType::EpicFailed => "epic_failed",
            EventType::TestStarted => "test_started",
            EventType::TestPassed => "test_passed",
            EventType::TestFailed => "test_failed",
            EventType::ValidationPassed => "validation_passed",
            EventType::ValidationFailed => "validation_failed",
            EventType::CommitCreated => "commit_created",
            EventType::PrCreated => "pr_created",
            EventType::PrMerged => "pr_merged",
            EventType::DeploymentStarted => "deployment_started",
            EventType::DeploymentCompleted => "deployment_completed",
            EventType::DeploymentFailed => "deployment_failed",
            EventType::ContextWindowUpdated => "context_window_updated",
            EventType::CheckpointCreated => "checkpoint_created",
            EventType::CheckpointLoaded => "checkpoint_loaded",
            EventType::FeatureRequested => "feature_requested",
            EventType::TaskSpawned => "task_spawned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted event in an instance's append-only stream.
///
/// `(instance_id, sequence_num)` is unique and dense per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub instance_id: InstanceId,
    pub sequence_num: u64,
    pub event_type: EventType,
    pub event_data: Value,
    pub metadata: Value,
    pub timestamp_epoch_ms: u64,
    pub created_at_epoch_ms: u64,
}

/// Kind of checkpoint snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointType {
    Manual,
    Automatic,
}

impl CheckpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointType::Manual => "manual",
            CheckpointType::Automatic => "automatic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(CheckpointType::Manual),
            "automatic" => Some(CheckpointType::Automatic),
            _ => None,
        }
    }
}

/// Advisory snapshot of an instance's work state.
///
/// The event stream stays canonical; a checkpoint lets a recovering
/// instance skip replaying everything before `sequence_num`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub instance_id: InstanceId,
    pub sequence_num: u64,
    pub checkpoint_type: CheckpointType,
    pub context_window_percent: u8,
    pub work_state: Value,
    pub created_at_epoch_ms: u64,
}

/// Input for one command-audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub command_type: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CommandEntry {
    /// Minimal successful entry for a tool invocation.
    pub fn tool_call(tool_name: impl Into<String>, parameters: Value) -> Self {
        let tool_name = tool_name.into();
        Self {
            command_type: "tool_call".to_string(),
            action: tool_name.clone(),
            tool_name: Some(tool_name),
            parameters,
            result: None,
            success: true,
            error_message: None,
            execution_time_ms: None,
            tags: Vec::new(),
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}

/// A persisted command-audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: i64,
    /// `None` means the anonymous sink (caller supplied no instance).
    pub instance_id: Option<InstanceId>,
    #[serde(flatten)]
    pub entry: CommandEntry,
    pub created_at_epoch_ms: u64,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
