// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint rows, consumption, retention, and the restore transaction.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::locks::insert_lock_in_tx;
use crate::store::{enum_from_str, enum_to_str, ms, Store};
use ft_core::checkpoint::{Checkpoint, CheckpointId, CheckpointTrigger};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::lock::{Lock, LockId, LockStatus};
use ft_core::mission::MissionId;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

/// Checkpoint retention rules.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_age_days: u32,
    pub keep_per_mission: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_age_days: 7, keep_per_mission: 3 }
    }
}

/// What a restore actually did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub sorties_restored: u32,
    pub locks_restored: u32,
    pub messages_requeued: u32,
    pub warnings: Vec<String>,
}

/// The snapshot columns are stored as one JSON payload; the queryable
/// fields are broken out into their own columns.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointPayload {
    sorties: Vec<ft_core::checkpoint::SortieSnapshot>,
    active_locks: Vec<ft_core::checkpoint::LockSnapshot>,
    pending_messages: Vec<ft_core::message::Message>,
    recovery_context: ft_core::checkpoint::RecoveryContext,
}

impl Store {
    /// Persist a checkpoint and its `checkpoint:created` event atomically.
    pub async fn insert_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let payload = CheckpointPayload {
            sorties: checkpoint.sorties.clone(),
            active_locks: checkpoint.active_locks.clone(),
            pending_messages: checkpoint.pending_messages.clone(),
            recovery_context: checkpoint.recovery_context.clone(),
        };

        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "INSERT INTO checkpoints (id, mission_id, timestamp_ms, trigger_kind,
                                      progress_percent, payload, created_by, consumed_at_ms,
                                      expires_at_ms, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.id.as_str())
        .bind(checkpoint.mission_id.as_str())
        .bind(checkpoint.timestamp_ms as i64)
        .bind(enum_to_str(&checkpoint.trigger)?)
        .bind(checkpoint.progress_percent)
        .bind(serde_json::to_string(&payload)?)
        .bind(&checkpoint.created_by)
        .bind(checkpoint.consumed_at_ms.map(|v| v as i64))
        .bind(checkpoint.expires_at_ms.map(|v| v as i64))
        .bind(checkpoint.version)
        .execute(&mut *tx)
        .await?;

        let event = EventPayload::CheckpointCreated {
            id: checkpoint.id.clone(),
            mission_id: checkpoint.mission_id.clone(),
            trigger: checkpoint.trigger,
            progress_percent: checkpoint.progress_percent,
        };
        append_in_tx(
            &mut tx,
            stream_types::MISSION,
            checkpoint.mission_id.as_str(),
            &event,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_checkpoint(
        &self,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    pub async fn list_checkpoints(
        &self,
        mission_id: Option<&MissionId>,
        limit: i64,
    ) -> Result<Vec<Checkpoint>, StorageError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM checkpoints WHERE 1 = 1");
        if let Some(mission_id) = mission_id {
            qb.push(" AND mission_id = ").push_bind(mission_id.as_str());
        }
        qb.push(" ORDER BY timestamp_ms DESC LIMIT ").push_bind(limit);
        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(checkpoint_from_row).collect()
    }

    /// The newest checkpoint for a mission, consumed or not.
    pub async fn latest_checkpoint(
        &self,
        mission_id: &MissionId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE mission_id = ?
             ORDER BY timestamp_ms DESC LIMIT 1",
        )
        .bind(mission_id.as_str())
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    /// The newest unconsumed checkpoint, used by specialist re-registration.
    pub async fn latest_unconsumed_checkpoint(
        &self,
        mission_id: &MissionId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE mission_id = ? AND consumed_at_ms IS NULL
             ORDER BY timestamp_ms DESC LIMIT 1",
        )
        .bind(mission_id.as_str())
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    /// Restore mission state from a checkpoint in one transaction.
    ///
    /// Idempotent: a second restore of the same checkpoint re-applies the
    /// same sortie rows, skips locks the right owner already holds, ignores
    /// already-queued messages, and leaves `consumed_at` at its first value.
    pub async fn restore_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        now_ms: u64,
    ) -> Result<RestoreReport, StorageError> {
        let mut report = RestoreReport::default();
        let mut tx = self.pool().begin().await?;

        // 1. Sortie snapshots: upsert status, assignee, progress, notes.
        for snap in &checkpoint.sorties {
            let updated = sqlx::query(
                "UPDATE sorties SET status = ?, assigned_to = ?, progress = ?,
                                    progress_notes = ?, updated_at_ms = ?
                 WHERE id = ?",
            )
            .bind(enum_to_str(&snap.status)?)
            .bind(snap.assigned_to.as_ref().map(|s| s.as_str().to_string()))
            .bind(snap.progress)
            .bind(snap.progress_notes.as_deref())
            .bind(now_ms as i64)
            .bind(snap.id.to_string())
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() > 0 {
                report.sorties_restored += 1;
            } else {
                report.warnings.push(format!("Sortie missing: {}", snap.id));
            }
        }

        // 2. Lock snapshots: expired are skipped, foreign holders win,
        //    everything else is re-acquired under a fresh lock id.
        for snap in &checkpoint.active_locks {
            if snap.expires_at_ms < now_ms {
                report.warnings.push(format!("Lock expired: {}", snap.file));
                continue;
            }
            let existing =
                sqlx::query("SELECT * FROM locks WHERE file = ? AND status = 'active'")
                    .bind(&snap.file)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(row) = existing {
                let holder = crate::locks::lock_from_row(&row)?;
                if holder.reserved_by == snap.reserved_by {
                    report.locks_restored += 1;
                } else {
                    report.warnings.push(format!(
                        "Lock conflict: {} held by {}",
                        snap.file, holder.reserved_by
                    ));
                }
                continue;
            }

            let lock = Lock {
                id: LockId::new(),
                file: snap.file.clone(),
                reserved_by: snap.reserved_by.clone(),
                reserved_at_ms: snap.reserved_at_ms,
                expires_at_ms: snap.expires_at_ms,
                released_at_ms: None,
                purpose: snap.purpose,
                timeout_ms: snap.timeout_ms,
                checksum: None,
                status: LockStatus::Active,
            };
            insert_lock_in_tx(&mut tx, &lock).await?;
            let payload = EventPayload::LockAcquired {
                id: lock.id.clone(),
                file: lock.file.clone(),
                reserved_by: lock.reserved_by.clone(),
                expires_at_ms: lock.expires_at_ms,
                purpose: lock.purpose,
            };
            append_in_tx(
                &mut tx,
                stream_types::LOCK,
                &lock.file,
                &payload,
                &NewEvent::default(),
                now_ms,
            )
            .await?;
            report.locks_restored += 1;
        }

        // 3. Pending messages: requeue by id, idempotently.
        for message in &checkpoint.pending_messages {
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO messages (id, from_specialist, to_specialists, subject,
                                                 payload, sent_at_ms, delivered)
                 VALUES (?, ?, ?, ?, ?, ?, 0)",
            )
            .bind(message.id.as_str())
            .bind(message.from.as_str())
            .bind(serde_json::to_string(&message.to)?)
            .bind(&message.subject)
            .bind(message.payload.to_string())
            .bind(message.sent_at_ms as i64)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() > 0 {
                report.messages_requeued += 1;
            }
        }

        // 4. Mark consumed (first restore only).
        sqlx::query(
            "UPDATE checkpoints SET consumed_at_ms = ? WHERE id = ? AND consumed_at_ms IS NULL",
        )
        .bind(now_ms as i64)
        .bind(checkpoint.id.as_str())
        .execute(&mut *tx)
        .await?;

        // 5. Announce.
        let payload = EventPayload::FleetRecovered {
            mission_id: checkpoint.mission_id.clone(),
            checkpoint_id: checkpoint.id.clone(),
            sorties_restored: report.sorties_restored,
            locks_restored: report.locks_restored,
            messages_requeued: report.messages_requeued,
            warnings: report.warnings.clone(),
        };
        append_in_tx(
            &mut tx,
            stream_types::MISSION,
            checkpoint.mission_id.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;

        tx.commit().await?;
        Ok(report)
    }

    /// Apply the retention policy; returns the ids of deleted checkpoints
    /// so the caller can sweep the file backups.
    ///
    /// Rules: drop checkpoints older than `max_age_days`, always keeping
    /// the `keep_per_mission` newest per mission; missions in terminal
    /// `completed` state keep only their final checkpoint.
    pub async fn prune_checkpoints(
        &self,
        policy: &RetentionPolicy,
        now_ms: u64,
    ) -> Result<Vec<(MissionId, CheckpointId)>, StorageError> {
        let cutoff_ms = now_ms.saturating_sub(u64::from(policy.max_age_days) * 86_400_000);

        let rows = sqlx::query(
            "SELECT c.id, c.mission_id, c.timestamp_ms, m.status AS mission_status
             FROM checkpoints c LEFT JOIN missions m ON m.id = c.mission_id
             ORDER BY c.mission_id, c.timestamp_ms DESC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut per_mission: HashMap<String, Vec<(String, u64, Option<String>)>> = HashMap::new();
        for row in &rows {
            let id: String = row.try_get("id")?;
            let mission_id: String = row.try_get("mission_id")?;
            let timestamp_ms = ms(row.try_get("timestamp_ms")?);
            let mission_status: Option<String> = row.try_get("mission_status")?;
            per_mission
                .entry(mission_id)
                .or_default()
                .push((id, timestamp_ms, mission_status));
        }

        let mut doomed: Vec<(MissionId, CheckpointId)> = Vec::new();
        for (mission_id, checkpoints) in per_mission {
            // Rows arrive newest-first per mission.
            let completed = checkpoints
                .first()
                .and_then(|(_, _, status)| status.as_deref().map(|s| s == "completed"))
                .unwrap_or(false);
            for (rank, (id, timestamp_ms, _)) in checkpoints.iter().enumerate() {
                let doom = if completed {
                    rank > 0
                } else {
                    rank >= policy.keep_per_mission as usize && *timestamp_ms < cutoff_ms
                };
                if doom {
                    doomed.push((
                        MissionId::from_string(mission_id.clone()),
                        CheckpointId::from_string(id.clone()),
                    ));
                }
            }
        }

        for (_, id) in &doomed {
            sqlx::query("DELETE FROM checkpoints WHERE id = ?")
                .bind(id.as_str())
                .execute(self.pool())
                .await?;
        }
        Ok(doomed)
    }
}

fn checkpoint_from_row(row: &SqliteRow) -> Result<Checkpoint, StorageError> {
    let trigger: String = row.try_get("trigger_kind")?;
    let payload: String = row.try_get("payload")?;
    let payload: CheckpointPayload = serde_json::from_str(&payload)?;
    let trigger: CheckpointTrigger = enum_from_str("checkpoint trigger", &trigger)?;
    Ok(Checkpoint {
        id: CheckpointId::from_string(row.try_get::<String, _>("id")?),
        mission_id: MissionId::from_string(row.try_get::<String, _>("mission_id")?),
        timestamp_ms: ms(row.try_get("timestamp_ms")?),
        trigger,
        progress_percent: row.try_get("progress_percent")?,
        sorties: payload.sorties,
        active_locks: payload.active_locks,
        pending_messages: payload.pending_messages,
        recovery_context: payload.recovery_context,
        created_by: row.try_get("created_by")?,
        consumed_at_ms: row.try_get::<Option<i64>, _>("consumed_at_ms")?.map(ms),
        expires_at_ms: row.try_get::<Option<i64>, _>("expires_at_ms")?.map(ms),
        version: row.try_get::<i64, _>("version")? as u32,
    })
}

#[cfg(test)]
#[path = "checkpoints_tests.rs"]
mod tests;
