// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared across the workspace's test suites.

use crate::checkpoint::{Checkpoint, CheckpointId, CheckpointTrigger, RecoveryContext};
use crate::lock::{Lock, LockId, LockPurpose, LockStatus};
use crate::mission::{Mission, MissionId, MissionStatus, Strategy};
use crate::sortie::{Sortie, SortieId, SortieStatus, SortieType};
use crate::specialist::{Specialist, SpecialistId, SpecialistStatus};

pub fn mission(total_sorties: u32) -> Mission {
    Mission {
        id: MissionId::new(),
        title: "test mission".to_string(),
        description: "a mission for tests".to_string(),
        strategy: Strategy::FeatureBased,
        status: MissionStatus::Pending,
        total_sorties,
        completed_sorties: 0,
        created_at_ms: 1_000_000,
        updated_at_ms: 1_000_000,
        started_at_ms: None,
        completed_at_ms: None,
    }
}

pub fn sortie(mission_id: &MissionId, index: u32, dependencies: Vec<u32>) -> Sortie {
    Sortie {
        id: SortieId::new(mission_id.clone(), index),
        mission_id: mission_id.clone(),
        sortie_index: index,
        title: format!("sortie {}", index),
        description: String::new(),
        files: vec![format!("/src/file_{}.rs", index)],
        new_files: vec![],
        dependencies,
        complexity: 2,
        sortie_type: SortieType::Task,
        status: SortieStatus::Pending,
        assigned_to: None,
        progress: 0,
        progress_notes: None,
        estimated_duration_ms: None,
        created_at_ms: 1_000_000,
        updated_at_ms: 1_000_000,
        started_at_ms: None,
        completed_at_ms: None,
    }
}

pub fn specialist(name: &str) -> Specialist {
    Specialist {
        id: SpecialistId::new(),
        name: name.to_string(),
        capabilities: vec!["edit".to_string()],
        status: SpecialistStatus::Registered,
        last_heartbeat_ms: 1_000_000,
        mission_id: None,
        sortie_id: None,
        progress_percent: 0,
        registered_at_ms: 1_000_000,
    }
}

pub fn lock(file: &str, holder: &SpecialistId, now_ms: u64, timeout_ms: u64) -> Lock {
    Lock {
        id: LockId::new(),
        file: crate::path::canonical_path(file),
        reserved_by: holder.clone(),
        reserved_at_ms: now_ms,
        expires_at_ms: now_ms + timeout_ms,
        released_at_ms: None,
        purpose: LockPurpose::Edit,
        timeout_ms,
        checksum: None,
        status: LockStatus::Active,
    }
}

pub fn checkpoint(mission_id: &MissionId, now_ms: u64) -> Checkpoint {
    Checkpoint {
        id: CheckpointId::new(),
        mission_id: mission_id.clone(),
        timestamp_ms: now_ms,
        trigger: CheckpointTrigger::Manual,
        progress_percent: 0.0,
        sorties: vec![],
        active_locks: vec![],
        pending_messages: vec![],
        recovery_context: RecoveryContext {
            last_action: "checkpoint created".to_string(),
            mission_summary: "test mission".to_string(),
            last_activity_at_ms: now_ms,
            ..RecoveryContext::default()
        },
        created_by: "test".to_string(),
        consumed_at_ms: None,
        expires_at_ms: None,
        version: crate::checkpoint::CHECKPOINT_VERSION,
    }
}
