// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sortie entity: a single work unit within a mission.

use crate::mission::MissionId;
use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier for a sortie: `<mission_id>.<index>`.
///
/// Not a random ID - the index encodes the sortie's position in the
/// mission's dependency graph, so the ID is derived, never generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortieId {
    mission: MissionId,
    index: u32,
}

/// Error parsing a sortie ID string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sortie id: {0}")]
pub struct ParseSortieIdError(pub String);

impl SortieId {
    pub fn new(mission: MissionId, index: u32) -> Self {
        Self { mission, index }
    }

    pub fn mission_id(&self) -> &MissionId {
        &self.mission
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Parse from the canonical `<mission_id>.<index>` form.
    pub fn parse(s: &str) -> Result<Self, ParseSortieIdError> {
        let (mission, index) = s
            .rsplit_once('.')
            .ok_or_else(|| ParseSortieIdError(s.to_string()))?;
        let index: u32 = index
            .parse()
            .map_err(|_| ParseSortieIdError(s.to_string()))?;
        if mission.is_empty() {
            return Err(ParseSortieIdError(s.to_string()));
        }
        Ok(Self { mission: MissionId::from_string(mission), index })
    }
}

impl std::fmt::Display for SortieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.mission, self.index)
    }
}

impl Serialize for SortieId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortieId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SortieId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Kind of work a sortie represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortieType {
    Task,
    Feature,
    Bugfix,
    Chore,
}

crate::simple_display! {
    SortieType {
        Task => "task",
        Feature => "feature",
        Bugfix => "bugfix",
        Chore => "chore",
    }
}

/// Sortie lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortieStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Blocked,
    Failed,
}

impl SortieStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SortieStatus::Completed | SortieStatus::Failed)
    }
}

crate::simple_display! {
    SortieStatus {
        Pending => "pending",
        Assigned => "assigned",
        InProgress => "in_progress",
        Completed => "completed",
        Blocked => "blocked",
        Failed => "failed",
    }
}

/// A single work unit within a mission.
///
/// `dependencies` holds sortie indices, all strictly less than
/// `sortie_index` - validated at decompose time, relied on everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sortie {
    pub id: SortieId,
    pub mission_id: MissionId,
    pub sortie_index: u32,
    pub title: String,
    pub description: String,
    pub files: Vec<String>,
    /// Files this sortie creates (exempt from cross-sortie overlap checks).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_files: Vec<String>,
    pub dependencies: Vec<u32>,
    /// Effort estimate in `[1, 5]`.
    pub complexity: u8,
    #[serde(rename = "type")]
    pub sortie_type: SortieType,
    pub status: SortieStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<SpecialistId>,
    /// Completion in `[0, 100]`.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Sortie {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// A sortie is eligible to run once every dependency index appears in
    /// `completed` and it has not started yet.
    pub fn is_ready(&self, completed: &[u32]) -> bool {
        self.status == SortieStatus::Pending
            && self.dependencies.iter().all(|d| completed.contains(d))
    }
}

#[cfg(test)]
#[path = "sortie_tests.rs"]
mod tests;
