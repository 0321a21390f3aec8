// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Specialist projections.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::store::{enum_from_str, enum_to_str, json_list, ms, Store};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::mission::MissionId;
use ft_core::sortie::SortieId;
use ft_core::specialist::{Specialist, SpecialistId, SpecialistStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Store {
    /// Insert a specialist record.
    ///
    /// Used both for registration (worker announcing readiness) and for the
    /// dispatcher pre-creating a record at spawn time; the event reflects
    /// which via `spawned`.
    pub async fn insert_specialist(
        &self,
        specialist: &Specialist,
        spawned: bool,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "INSERT INTO specialists (id, name, capabilities, status, last_heartbeat_ms,
                                      mission_id, sortie_id, progress_percent, registered_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 capabilities = excluded.capabilities,
                 status = excluded.status,
                 last_heartbeat_ms = excluded.last_heartbeat_ms",
        )
        .bind(specialist.id.as_str())
        .bind(&specialist.name)
        .bind(serde_json::to_string(&specialist.capabilities)?)
        .bind(enum_to_str(&specialist.status)?)
        .bind(specialist.last_heartbeat_ms as i64)
        .bind(specialist.mission_id.as_ref().map(|m| m.as_str().to_string()))
        .bind(specialist.sortie_id.as_ref().map(|s| s.to_string()))
        .bind(specialist.progress_percent)
        .bind(specialist.registered_at_ms as i64)
        .execute(&mut *tx)
        .await?;

        let payload = match (&specialist.mission_id, &specialist.sortie_id, spawned) {
            (Some(mission_id), Some(sortie_id), true) => EventPayload::SpecialistSpawned {
                id: specialist.id.clone(),
                mission_id: mission_id.clone(),
                sortie_id: sortie_id.clone(),
            },
            _ => EventPayload::SpecialistRegistered {
                id: specialist.id.clone(),
                name: specialist.name.clone(),
                capabilities: specialist.capabilities.clone(),
            },
        };
        append_in_tx(
            &mut tx,
            stream_types::SPECIALIST,
            specialist.id.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_specialist(
        &self,
        id: &SpecialistId,
    ) -> Result<Option<Specialist>, StorageError> {
        let row = sqlx::query("SELECT * FROM specialists WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(specialist_from_row).transpose()
    }

    pub async fn specialists_for_mission(
        &self,
        mission_id: &MissionId,
    ) -> Result<Vec<Specialist>, StorageError> {
        let rows = sqlx::query("SELECT * FROM specialists WHERE mission_id = ?")
            .bind(mission_id.as_str())
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(specialist_from_row).collect()
    }

    /// Refresh a specialist's heartbeat. Every report path calls this.
    pub async fn touch_specialist(
        &self,
        id: &SpecialistId,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;
        let updated = sqlx::query(
            "UPDATE specialists SET last_heartbeat_ms = ?,
                                    status = CASE WHEN status = 'registered' THEN 'working' ELSE status END
             WHERE id = ?",
        )
        .bind(now_ms as i64)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::not_found("specialist", id.as_str()));
        }
        let payload = EventPayload::SpecialistHeartbeat { id: id.clone() };
        append_in_tx(
            &mut tx,
            stream_types::SPECIALIST,
            id.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_specialist_status(
        &self,
        id: &SpecialistId,
        status: SpecialistStatus,
    ) -> Result<(), StorageError> {
        let updated = sqlx::query("UPDATE specialists SET status = ? WHERE id = ?")
            .bind(enum_to_str(&status)?)
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::not_found("specialist", id.as_str()));
        }
        Ok(())
    }

    pub async fn set_specialist_progress(
        &self,
        id: &SpecialistId,
        progress_percent: u8,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE specialists SET progress_percent = ? WHERE id = ?")
            .bind(progress_percent.min(100))
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Remove a specialist record (after completion or heartbeat timeout).
    pub async fn remove_specialist(&self, id: &SpecialistId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM specialists WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

fn specialist_from_row(row: &SqliteRow) -> Result<Specialist, StorageError> {
    let status: String = row.try_get("status")?;
    let capabilities: String = row.try_get("capabilities")?;
    let sortie_id: Option<String> = row.try_get("sortie_id")?;
    let sortie_id = sortie_id
        .map(|s| SortieId::parse(&s).map_err(|_| StorageError::Corrupt("sortie id", s)))
        .transpose()?;
    Ok(Specialist {
        id: SpecialistId::from_string(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        capabilities: json_list("capabilities", &capabilities)?,
        status: enum_from_str("specialist status", &status)?,
        last_heartbeat_ms: ms(row.try_get("last_heartbeat_ms")?),
        mission_id: row
            .try_get::<Option<String>, _>("mission_id")?
            .map(MissionId::from_string),
        sortie_id,
        progress_percent: row.try_get::<i64, _>("progress_percent")? as u8,
        registered_at_ms: ms(row.try_get("registered_at_ms")?),
    })
}
