// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission entity and status machine.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a mission.
    ///
    /// Each decomposed task gets a mission ID used to key its event stream,
    /// its sorties, and its checkpoints.
    pub struct MissionId("msn-");
}

/// Decomposition strategy chosen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    FileBased,
    FeatureBased,
    RiskBased,
    ResearchBased,
}

crate::simple_display! {
    Strategy {
        FileBased => "file-based",
        FeatureBased => "feature-based",
        RiskBased => "risk-based",
        ResearchBased => "research-based",
    }
}

/// Mission lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl MissionStatus {
    /// Terminal missions accept no further sortie work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Cancelled)
    }
}

crate::simple_display! {
    MissionStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Blocked => "blocked",
        Cancelled => "cancelled",
    }
}

/// A decomposed user task, owning a set of sorties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub title: String,
    pub description: String,
    pub strategy: Strategy,
    pub status: MissionStatus,
    pub total_sorties: u32,
    pub completed_sorties: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Mission {
    /// Completed fraction as a percentage in `[0, 100]`.
    pub fn progress_percent(&self) -> f64 {
        if self.total_sorties == 0 {
            return 0.0;
        }
        f64::from(self.completed_sorties) / f64::from(self.total_sorties) * 100.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "mission_tests.rs"]
mod tests;
