// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint service: atomic mission snapshots with dual persistence.
//!
//! A checkpoint is read from the store in one transaction-equivalent pass,
//! written to the primary store together with its `checkpoint:created`
//! event, and mirrored to a JSON file. File-side failures degrade to a
//! warning - the primary row is authoritative.

use ft_core::checkpoint::{
    Checkpoint, CheckpointId, CheckpointTrigger, LockSnapshot, RecoveryContext, SortieSnapshot,
    CHECKPOINT_VERSION,
};
use ft_core::event::stream_types;
use ft_core::mission::{Mission, MissionId};
use ft_core::sortie::SortieStatus;
use ft_core::Clock;
use ft_storage::{CheckpointBackup, RetentionPolicy, StorageError, Store};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("mission not found: {0}")]
    MissionNotFound(String),
}

/// Creates, reads, and prunes checkpoints.
pub struct CheckpointService<C: Clock> {
    store: Store,
    backup: CheckpointBackup,
    clock: C,
    retention: RetentionPolicy,
}

impl<C: Clock> CheckpointService<C> {
    pub fn new(store: Store, backup: CheckpointBackup, clock: C) -> Self {
        Self { store, backup, clock, retention: RetentionPolicy::default() }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Snapshot a mission.
    ///
    /// Periodic `progress` checkpoints that would duplicate the previous
    /// one (same progress, same sortie states) are skipped and the existing
    /// checkpoint is returned instead.
    pub async fn create(
        &self,
        mission_id: &MissionId,
        trigger: CheckpointTrigger,
        created_by: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let now_ms = self.clock.epoch_ms();
        let mission = self
            .store
            .get_mission(mission_id)
            .await?
            .ok_or_else(|| CheckpointError::MissionNotFound(mission_id.to_string()))?;

        let sorties = self.store.sorties_for_mission(mission_id, None).await?;
        let sortie_snapshots: Vec<SortieSnapshot> = sorties
            .iter()
            .filter(|s| !s.is_terminal())
            .map(|s| SortieSnapshot {
                id: s.id.clone(),
                status: s.status,
                assigned_to: s.assigned_to.clone(),
                files: s.files.clone(),
                progress: s.progress,
                progress_notes: s.progress_notes.clone(),
                started_at_ms: s.started_at_ms,
                updated_at_ms: s.updated_at_ms,
            })
            .collect();

        let specialists = self.store.specialists_for_mission(mission_id).await?;
        let crew_ids: HashSet<String> =
            specialists.iter().map(|s| s.id.as_str().to_string()).collect();

        let lock_snapshots: Vec<LockSnapshot> = self
            .store
            .active_locks()
            .await?
            .into_iter()
            .filter(|l| crew_ids.contains(l.reserved_by.as_str()) && l.is_live(now_ms))
            .map(|l| LockSnapshot {
                id: l.id,
                file: l.file,
                reserved_by: l.reserved_by,
                reserved_at_ms: l.reserved_at_ms,
                expires_at_ms: l.expires_at_ms,
                purpose: l.purpose,
                timeout_ms: l.timeout_ms,
            })
            .collect();

        let pending_messages: Vec<ft_core::Message> = self
            .store
            .pending_messages()
            .await?
            .into_iter()
            .filter(|m| {
                crew_ids.contains(m.from.as_str())
                    || m.to.iter().any(|t| crew_ids.contains(t.as_str()))
            })
            .collect();

        let recovery_context =
            build_recovery_context(&self.store, &mission, &sorties, now_ms).await?;

        // Skip duplicate periodic checkpoints.
        if trigger == CheckpointTrigger::Progress {
            if let Some(latest) = self.store.latest_checkpoint(mission_id).await? {
                if latest.trigger == CheckpointTrigger::Progress
                    && latest.progress_percent == mission.progress_percent()
                    && latest.sorties == sortie_snapshots
                    && latest.active_locks == lock_snapshots
                {
                    tracing::debug!(mission = %mission_id, "state unchanged, reusing checkpoint");
                    return Ok(latest);
                }
            }
        }

        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            mission_id: mission_id.clone(),
            timestamp_ms: now_ms,
            trigger,
            progress_percent: mission.progress_percent(),
            sorties: sortie_snapshots,
            active_locks: lock_snapshots,
            pending_messages,
            recovery_context,
            created_by: created_by.to_string(),
            consumed_at_ms: None,
            expires_at_ms: None,
            version: CHECKPOINT_VERSION,
        };

        self.store.insert_checkpoint(&checkpoint, now_ms).await?;
        if let Err(e) = self.backup.write(&checkpoint) {
            tracing::warn!(checkpoint = %checkpoint.id, error = %e, "file backup failed");
        }
        tracing::info!(
            mission = %mission_id,
            checkpoint = %checkpoint.id,
            trigger = %trigger,
            progress = checkpoint.progress_percent,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Read a checkpoint by id: primary store first, file backup on miss.
    pub async fn get(&self, id: &CheckpointId) -> Result<Option<Checkpoint>, CheckpointError> {
        if let Some(checkpoint) = self.store.get_checkpoint(id).await? {
            return Ok(Some(checkpoint));
        }
        Ok(self.backup.find(id)?)
    }

    /// Latest checkpoint for a mission: primary store first, then the
    /// mission's `latest.json` pointer.
    pub async fn latest_for(
        &self,
        mission_id: &MissionId,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        if let Some(checkpoint) = self.store.latest_checkpoint(mission_id).await? {
            return Ok(Some(checkpoint));
        }
        Ok(self.backup.load_latest(mission_id)?)
    }

    pub async fn list(
        &self,
        mission_id: Option<&MissionId>,
        limit: i64,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        Ok(self.store.list_checkpoints(mission_id, limit).await?)
    }

    /// Apply retention to rows and file backups; returns deleted count.
    pub async fn prune(&self, policy: Option<RetentionPolicy>) -> Result<usize, CheckpointError> {
        let policy = policy.unwrap_or(self.retention);
        let now_ms = self.clock.epoch_ms();
        let doomed = self.store.prune_checkpoints(&policy, now_ms).await?;
        for (mission_id, checkpoint_id) in &doomed {
            self.backup.remove(mission_id, checkpoint_id);
        }
        if !doomed.is_empty() {
            tracing::info!(deleted = doomed.len(), "pruned checkpoints");
        }
        Ok(doomed.len())
    }

    /// Drop a mission's file backups (mission deletion).
    pub fn remove_backups(&self, mission_id: &MissionId) {
        self.backup.remove_mission(mission_id);
    }
}

/// Assemble the recovery context for a mission at an instant.
async fn build_recovery_context(
    store: &Store,
    mission: &Mission,
    sorties: &[ft_core::Sortie],
    now_ms: u64,
) -> Result<RecoveryContext, StorageError> {
    let last_event = store
        .latest_event(stream_types::MISSION, mission.id.as_str())
        .await?;
    let last_activity_at_ms = last_event
        .as_ref()
        .map(|e| e.occurred_at_ms)
        .unwrap_or(mission.updated_at_ms);
    let last_action = match &last_event {
        Some(e) => format!(
            "{} ({} of {} sorties complete)",
            e.event_type, mission.completed_sorties, mission.total_sorties
        ),
        None => "mission created".to_string(),
    };

    let next_steps: Vec<String> = sorties
        .iter()
        .filter(|s| !s.is_terminal())
        .map(|s| match s.status {
            SortieStatus::InProgress | SortieStatus::Assigned => {
                format!("finish sortie {} ({}% done): {}", s.id, s.progress, s.title)
            }
            _ => format!("start sortie {}: {}", s.id, s.title),
        })
        .collect();

    let blockers: Vec<String> = sorties
        .iter()
        .filter(|s| s.status == SortieStatus::Blocked)
        .map(|s| match &s.progress_notes {
            Some(notes) => format!("sortie {} blocked: {}", s.id, notes),
            None => format!("sortie {} blocked", s.id),
        })
        .collect();

    let files_modified: Vec<String> = sorties
        .iter()
        .filter(|s| {
            matches!(
                s.status,
                SortieStatus::InProgress | SortieStatus::Completed | SortieStatus::Blocked
            )
        })
        .flat_map(|s| s.files.iter().cloned())
        .collect();

    Ok(RecoveryContext {
        last_action,
        next_steps,
        blockers,
        files_modified,
        mission_summary: format!(
            "{} ({}/{} sorties complete)",
            mission.title, mission.completed_sorties, mission.total_sorties
        ),
        elapsed_time_ms: now_ms.saturating_sub(mission.created_at_ms),
        last_activity_at_ms,
    })
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
