// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint: a snapshot sufficient to resume a mission.

use crate::lock::{LockId, LockPurpose};
use crate::message::Message;
use crate::mission::MissionId;
use crate::sortie::{SortieId, SortieStatus};
use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};

/// Current checkpoint schema version
pub const CHECKPOINT_VERSION: u32 = 1;

crate::define_id! {
    /// Unique identifier for a checkpoint.
    pub struct CheckpointId("ckp-");
}

/// What caused a checkpoint to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTrigger {
    Progress,
    Error,
    Manual,
}

crate::simple_display! {
    CheckpointTrigger {
        Progress => "progress",
        Error => "error",
        Manual => "manual",
    }
}

/// Snapshot of a non-terminal sortie at checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortieSnapshot {
    pub id: SortieId,
    pub status: SortieStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<SpecialistId>,
    pub files: Vec<String>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    pub updated_at_ms: u64,
}

/// Snapshot of an active, unexpired lock at checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockSnapshot {
    pub id: LockId,
    pub file: String,
    pub reserved_by: SpecialistId,
    pub reserved_at_ms: u64,
    pub expires_at_ms: u64,
    pub purpose: LockPurpose,
    pub timeout_ms: u64,
}

/// Structured context injected into an agent prompt on resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryContext {
    pub last_action: String,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    pub mission_summary: String,
    pub elapsed_time_ms: u64,
    pub last_activity_at_ms: u64,
}

impl RecoveryContext {
    /// Render as natural-language text with stable section headings,
    /// suitable for direct injection into an LLM prompt.
    pub fn to_prompt(&self) -> String {
        let mut out = String::from("## Recovery Context\n\n");
        out.push_str(&format!("**Mission**: {}\n\n", self.mission_summary));
        out.push_str(&format!("Last action: {}\n", self.last_action));
        out.push_str(&format!(
            "Elapsed: {}\n",
            crate::format_elapsed_ms(self.elapsed_time_ms)
        ));

        if !self.next_steps.is_empty() {
            out.push_str("\n### Next Steps\n");
            for step in &self.next_steps {
                out.push_str(&format!("- {}\n", step));
            }
        }

        if !self.blockers.is_empty() {
            out.push_str("\n### Blockers\n");
            for blocker in &self.blockers {
                out.push_str(&format!("- {}\n", blocker));
            }
        }

        if !self.files_modified.is_empty() {
            out.push_str("\n### Files Modified\n");
            for file in &self.files_modified {
                out.push_str(&format!("- {}\n", file));
            }
        }

        out
    }
}

/// A snapshot of mission state at an instant, sufficient to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub mission_id: MissionId,
    pub timestamp_ms: u64,
    pub trigger: CheckpointTrigger,
    pub progress_percent: f64,
    pub sorties: Vec<SortieSnapshot>,
    pub active_locks: Vec<LockSnapshot>,
    pub pending_messages: Vec<Message>,
    pub recovery_context: RecoveryContext,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
}

impl Checkpoint {
    /// A checkpoint may be consumed at most once.
    pub fn is_consumed(&self) -> bool {
        self.consumed_at_ms.is_some()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
