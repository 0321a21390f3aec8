// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery service: stale-mission detection and checkpoint restoration.

use crate::checkpoint::{CheckpointError, CheckpointService};
use ft_core::checkpoint::{Checkpoint, CheckpointId};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::mission::{MissionId, MissionStatus};
use ft_core::Clock;
use ft_storage::{RestoreReport, StorageError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// No mission activity for this long makes it a recovery candidate.
pub const DEFAULT_ACTIVITY_THRESHOLD_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
}

/// Outcome of a recover call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    /// Prompt-ready recovery text with stable headings.
    pub recovery_context: String,
    pub dry_run: bool,
    /// What a dry run would restore / what a real run restored.
    pub report: RestoreReport,
}

/// Detects stale missions and restores them from checkpoints.
pub struct RecoveryService<C: Clock> {
    store: Store,
    checkpoints: Arc<CheckpointService<C>>,
    clock: C,
    activity_threshold_ms: u64,
}

impl<C: Clock> RecoveryService<C> {
    pub fn new(store: Store, checkpoints: Arc<CheckpointService<C>>, clock: C) -> Self {
        Self {
            store,
            checkpoints,
            clock,
            activity_threshold_ms: DEFAULT_ACTIVITY_THRESHOLD_MS,
        }
    }

    pub fn with_activity_threshold(mut self, threshold_ms: u64) -> Self {
        self.activity_threshold_ms = threshold_ms;
        self
    }

    /// Scan for in-progress missions with no recent activity and a usable
    /// checkpoint. Emits `context:compacted` once per stall; a mission
    /// whose latest event is already `context:compacted` stays a candidate
    /// without a second event.
    pub async fn scan_stale(&self) -> Result<Vec<MissionId>, RecoveryError> {
        let now_ms = self.clock.epoch_ms();
        let mut candidates = Vec::new();

        for mission in self.store.missions_with_status(MissionStatus::InProgress).await? {
            let latest = self
                .store
                .latest_event(stream_types::MISSION, mission.id.as_str())
                .await?;
            let (last_activity_ms, already_flagged) = match &latest {
                Some(event) => (event.occurred_at_ms, event.event_type == "context:compacted"),
                None => (mission.updated_at_ms, false),
            };
            let idle_ms = now_ms.saturating_sub(last_activity_ms);
            if !already_flagged && idle_ms <= self.activity_threshold_ms {
                continue;
            }
            if self.checkpoints.latest_for(&mission.id).await?.is_none() {
                tracing::warn!(mission = %mission.id, idle_ms, "stale mission has no checkpoint");
                continue;
            }
            if !already_flagged {
                let payload = EventPayload::ContextCompacted {
                    mission_id: mission.id.clone(),
                    idle_ms,
                };
                self.store
                    .append_event(
                        stream_types::MISSION,
                        mission.id.as_str(),
                        &payload,
                        NewEvent::default(),
                        now_ms,
                    )
                    .await?;
                tracing::info!(mission = %mission.id, idle_ms, "mission went stale");
            }
            candidates.push(mission.id.clone());
        }
        Ok(candidates)
    }

    /// Restore a mission from a checkpoint (or preview with `dry_run`).
    pub async fn recover(
        &self,
        checkpoint_id: &CheckpointId,
        agent_id: &str,
        dry_run: bool,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let checkpoint = self
            .checkpoints
            .get(checkpoint_id)
            .await?
            .ok_or_else(|| RecoveryError::CheckpointNotFound(checkpoint_id.to_string()))?;

        let report = if dry_run {
            self.preview(&checkpoint).await?
        } else {
            let report = self.store.restore_checkpoint(&checkpoint, self.clock.epoch_ms()).await?;
            tracing::info!(
                checkpoint = %checkpoint.id,
                mission = %checkpoint.mission_id,
                agent = agent_id,
                sorties = report.sorties_restored,
                locks = report.locks_restored,
                messages = report.messages_requeued,
                "fleet recovered"
            );
            report
        };

        Ok(RecoveryOutcome {
            success: true,
            recovery_context: render_recovery_prompt(&checkpoint, &report),
            dry_run,
            report,
        })
    }

    /// Compute what a restore would do, without side effects.
    async fn preview(&self, checkpoint: &Checkpoint) -> Result<RestoreReport, RecoveryError> {
        let now_ms = self.clock.epoch_ms();
        let mut report = RestoreReport::default();

        for snap in &checkpoint.sorties {
            if self.store.get_sortie(&snap.id).await?.is_some() {
                report.sorties_restored += 1;
            } else {
                report.warnings.push(format!("Sortie missing: {}", snap.id));
            }
        }

        for snap in &checkpoint.active_locks {
            if snap.expires_at_ms < now_ms {
                report.warnings.push(format!("Lock expired: {}", snap.file));
                continue;
            }
            match self.store.active_lock_for_file(&snap.file).await? {
                Some(holder) if holder.reserved_by != snap.reserved_by => {
                    report.warnings.push(format!(
                        "Lock conflict: {} held by {}",
                        snap.file, holder.reserved_by
                    ));
                }
                _ => report.locks_restored += 1,
            }
        }

        let pending = self.store.pending_messages().await?;
        for message in &checkpoint.pending_messages {
            if !pending.iter().any(|m| m.id == message.id) {
                report.messages_requeued += 1;
            }
        }
        Ok(report)
    }
}

/// Render the prompt text for a recovery, folding restore warnings into
/// the blocker section.
pub fn render_recovery_prompt(checkpoint: &Checkpoint, report: &RestoreReport) -> String {
    let mut context = checkpoint.recovery_context.clone();
    for warning in &report.warnings {
        if !context.blockers.contains(warning) {
            context.blockers.push(warning.clone());
        }
    }
    context.to_prompt()
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
