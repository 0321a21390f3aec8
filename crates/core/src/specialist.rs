// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Specialist entity: a registered worker bound to at most one sortie.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a specialist (worker process).
    pub struct SpecialistId("spc-");
}

/// Specialist lifecycle status, as tracked by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistStatus {
    /// Record created, process launch requested.
    Spawned,
    /// The worker announced readiness.
    Registered,
    Working,
    Blocked,
    Completed,
    Failed,
}

impl SpecialistStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpecialistStatus::Completed | SpecialistStatus::Failed)
    }
}

crate::simple_display! {
    SpecialistStatus {
        Spawned => "spawned",
        Registered => "registered",
        Working => "working",
        Blocked => "blocked",
        Completed => "completed",
        Failed => "failed",
    }
}

/// A registered worker.
///
/// Liveness is heartbeat-driven: every report over HTTP refreshes
/// `last_heartbeat_ms`; the dispatcher's monitor fails specialists whose
/// heartbeat goes stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialist {
    pub id: SpecialistId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    pub status: SpecialistStatus,
    pub last_heartbeat_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<crate::mission::MissionId>,
    /// Sortie this specialist is bound to, as `<mission_id>.<index>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortie_id: Option<crate::sortie::SortieId>,
    pub progress_percent: u8,
    pub registered_at_ms: u64,
}

impl Specialist {
    /// True when no heartbeat has arrived within `timeout_ms`.
    pub fn heartbeat_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > timeout_ms
    }
}

#[cfg(test)]
#[path = "specialist_tests.rs"]
mod tests;
