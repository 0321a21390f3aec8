// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission and sortie projections.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::store::{enum_from_str, enum_to_str, json_list, ms, Store};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::mission::{Mission, MissionId, MissionStatus, Strategy};
use ft_core::sortie::{Sortie, SortieId, SortieStatus, SortieType};
use ft_core::specialist::SpecialistId;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// A validated mission plus its sorties, ready to persist.
#[derive(Debug, Clone)]
pub struct NewMission {
    pub mission: Mission,
    pub sorties: Vec<Sortie>,
}

/// Listing filter for `GET /missions`.
#[derive(Debug, Clone, Default)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
    pub strategy: Option<Strategy>,
    pub limit: i64,
    pub offset: i64,
}

/// One page of missions.
#[derive(Debug, Clone)]
pub struct MissionPage {
    pub missions: Vec<Mission>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Store {
    /// Persist a decomposed mission and its sorties atomically.
    pub async fn create_mission(&self, new: &NewMission, now_ms: u64) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;
        insert_mission(&mut tx, &new.mission).await?;
        for sortie in &new.sorties {
            insert_sortie(&mut tx, sortie).await?;
        }
        let payload = EventPayload::MissionCreated {
            id: new.mission.id.clone(),
            title: new.mission.title.clone(),
            strategy: new.mission.strategy,
            total_sorties: new.mission.total_sorties,
        };
        append_in_tx(
            &mut tx,
            stream_types::MISSION,
            new.mission.id.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_mission(&self, id: &MissionId) -> Result<Option<Mission>, StorageError> {
        let row = sqlx::query("SELECT * FROM missions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(mission_from_row).transpose()
    }

    pub async fn list_missions(&self, filter: &MissionFilter) -> Result<MissionPage, StorageError> {
        let mut count_qb = sqlx::QueryBuilder::new("SELECT COUNT(*) AS n FROM missions WHERE 1 = 1");
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM missions WHERE 1 = 1");
        for builder in [&mut count_qb, &mut qb] {
            if let Some(status) = &filter.status {
                builder.push(" AND status = ").push_bind(enum_to_str(status)?);
            }
            if let Some(strategy) = &filter.strategy {
                builder.push(" AND strategy = ").push_bind(enum_to_str(strategy)?);
            }
        }
        let total: i64 = count_qb.build().fetch_one(self.pool()).await?.try_get("n")?;

        qb.push(" ORDER BY created_at_ms DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let rows = qb.build().fetch_all(self.pool()).await?;
        let missions = rows.iter().map(mission_from_row).collect::<Result<_, _>>()?;

        Ok(MissionPage { missions, total, limit: filter.limit, offset: filter.offset })
    }

    pub async fn missions_with_status(
        &self,
        status: MissionStatus,
    ) -> Result<Vec<Mission>, StorageError> {
        let rows = sqlx::query("SELECT * FROM missions WHERE status = ?")
            .bind(enum_to_str(&status)?)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(mission_from_row).collect()
    }

    /// Transition a mission's status, stamping the lifecycle timestamps.
    pub async fn set_mission_status(
        &self,
        id: &MissionId,
        status: MissionStatus,
        now_ms: u64,
    ) -> Result<Mission, StorageError> {
        let mut tx = self.pool().begin().await?;
        let mission = set_mission_status_in_tx(&mut tx, id, status, now_ms).await?;
        tx.commit().await?;
        Ok(mission)
    }

    /// Delete a mission; sorties cascade, checkpoints are swept with it.
    pub async fn delete_mission(&self, id: &MissionId, now_ms: u64) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;
        let deleted = sqlx::query("DELETE FROM missions WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StorageError::not_found("mission", id.as_str()));
        }
        sqlx::query("DELETE FROM checkpoints WHERE mission_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM specialists WHERE mission_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let payload = EventPayload::MissionDeleted { id: id.clone() };
        append_in_tx(
            &mut tx,
            stream_types::MISSION,
            id.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_sortie(&self, id: &SortieId) -> Result<Option<Sortie>, StorageError> {
        let row = sqlx::query("SELECT * FROM sorties WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(sortie_from_row).transpose()
    }

    pub async fn sorties_for_mission(
        &self,
        mission_id: &MissionId,
        status: Option<SortieStatus>,
    ) -> Result<Vec<Sortie>, StorageError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM sorties WHERE mission_id = ");
        qb.push_bind(mission_id.as_str());
        if let Some(status) = &status {
            qb.push(" AND status = ").push_bind(enum_to_str(status)?);
        }
        qb.push(" ORDER BY sortie_index ASC");
        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(sortie_from_row).collect()
    }

    /// Transition a sortie's status (and optionally its assignee).
    pub async fn set_sortie_status(
        &self,
        id: &SortieId,
        status: SortieStatus,
        assigned_to: Option<&SpecialistId>,
        now_ms: u64,
    ) -> Result<Sortie, StorageError> {
        let mut tx = self.pool().begin().await?;
        let sortie = set_sortie_status_in_tx(&mut tx, id, status, assigned_to, now_ms).await?;
        tx.commit().await?;
        Ok(sortie)
    }

    /// Record a progress report against a sortie.
    pub async fn set_sortie_progress(
        &self,
        id: &SortieId,
        progress: u8,
        notes: Option<&str>,
        now_ms: u64,
    ) -> Result<Sortie, StorageError> {
        let progress = progress.min(100);
        let mut tx = self.pool().begin().await?;
        let updated = sqlx::query(
            "UPDATE sorties SET progress = ?, progress_notes = COALESCE(?, progress_notes),
                                status = CASE WHEN status IN ('pending', 'assigned') THEN 'in_progress' ELSE status END,
                                started_at_ms = COALESCE(started_at_ms, ?),
                                updated_at_ms = ?
             WHERE id = ?",
        )
        .bind(progress)
        .bind(notes)
        .bind(now_ms as i64)
        .bind(now_ms as i64)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::not_found("sortie", id.to_string()));
        }
        let payload = EventPayload::SortieProgress {
            id: id.clone(),
            progress,
            notes: notes.map(str::to_string),
        };
        append_in_tx(
            &mut tx,
            stream_types::MISSION,
            id.mission_id().as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        self.get_sortie(id)
            .await?
            .ok_or_else(|| StorageError::not_found("sortie", id.to_string()))
    }

    /// Mark a sortie completed and roll the mission counters forward.
    ///
    /// One transaction covers the sortie update, the mission counter, the
    /// mission's own status transition when this was the last sortie, and
    /// every event - invariant: `completed_sorties` always equals the count
    /// of completed sortie rows.
    pub async fn complete_sortie(
        &self,
        id: &SortieId,
        now_ms: u64,
    ) -> Result<(Sortie, Mission), StorageError> {
        let mission_id = id.mission_id().clone();
        let mut tx = self.pool().begin().await?;

        let sortie =
            set_sortie_status_in_tx(&mut tx, id, SortieStatus::Completed, None, now_ms).await?;
        sqlx::query("UPDATE sorties SET progress = 100 WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sorties WHERE mission_id = ? AND status = 'completed'",
        )
        .bind(mission_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let completed: i64 = row.try_get("n")?;

        sqlx::query("UPDATE missions SET completed_sorties = ?, updated_at_ms = ? WHERE id = ?")
            .bind(completed)
            .bind(now_ms as i64)
            .bind(mission_id.as_str())
            .execute(&mut *tx)
            .await?;

        let mission_row = sqlx::query("SELECT * FROM missions WHERE id = ?")
            .bind(mission_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::not_found("mission", mission_id.as_str()))?;
        let mission = mission_from_row(&mission_row)?;

        let mission = if completed as u32 >= mission.total_sorties
            && mission.status != MissionStatus::Completed
        {
            set_mission_status_in_tx(&mut tx, &mission_id, MissionStatus::Completed, now_ms).await?
        } else {
            mission
        };

        tx.commit().await?;
        Ok((sortie, mission))
    }
}

async fn insert_mission(tx: &mut SqliteConnection, mission: &Mission) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO missions (id, title, description, strategy, status, total_sorties,
                               completed_sorties, created_at_ms, updated_at_ms, started_at_ms,
                               completed_at_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(mission.id.as_str())
    .bind(&mission.title)
    .bind(&mission.description)
    .bind(enum_to_str(&mission.strategy)?)
    .bind(enum_to_str(&mission.status)?)
    .bind(mission.total_sorties)
    .bind(mission.completed_sorties)
    .bind(mission.created_at_ms as i64)
    .bind(mission.updated_at_ms as i64)
    .bind(mission.started_at_ms.map(|v| v as i64))
    .bind(mission.completed_at_ms.map(|v| v as i64))
    .execute(tx)
    .await?;
    Ok(())
}

async fn insert_sortie(tx: &mut SqliteConnection, sortie: &Sortie) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO sorties (id, mission_id, sortie_index, title, description, files, new_files,
                              dependencies, complexity, sortie_type, status, assigned_to,
                              progress, progress_notes, estimated_duration_ms, created_at_ms,
                              updated_at_ms, started_at_ms, completed_at_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(sortie.id.to_string())
    .bind(sortie.mission_id.as_str())
    .bind(sortie.sortie_index)
    .bind(&sortie.title)
    .bind(&sortie.description)
    .bind(serde_json::to_string(&sortie.files)?)
    .bind(serde_json::to_string(&sortie.new_files)?)
    .bind(serde_json::to_string(&sortie.dependencies)?)
    .bind(sortie.complexity)
    .bind(enum_to_str(&sortie.sortie_type)?)
    .bind(enum_to_str(&sortie.status)?)
    .bind(sortie.assigned_to.as_ref().map(|s| s.as_str().to_string()))
    .bind(sortie.progress)
    .bind(sortie.progress_notes.as_deref())
    .bind(sortie.estimated_duration_ms.map(|v| v as i64))
    .bind(sortie.created_at_ms as i64)
    .bind(sortie.updated_at_ms as i64)
    .bind(sortie.started_at_ms.map(|v| v as i64))
    .bind(sortie.completed_at_ms.map(|v| v as i64))
    .execute(tx)
    .await?;
    Ok(())
}

pub(crate) async fn set_mission_status_in_tx(
    tx: &mut SqliteConnection,
    id: &MissionId,
    status: MissionStatus,
    now_ms: u64,
) -> Result<Mission, StorageError> {
    let updated = sqlx::query(
        "UPDATE missions SET status = ?, updated_at_ms = ?,
                             started_at_ms = CASE WHEN ? = 'in_progress'
                                                  THEN COALESCE(started_at_ms, ?)
                                                  ELSE started_at_ms END,
                             completed_at_ms = CASE WHEN ? IN ('completed', 'cancelled')
                                                    THEN COALESCE(completed_at_ms, ?)
                                                    ELSE completed_at_ms END
         WHERE id = ?",
    )
    .bind(enum_to_str(&status)?)
    .bind(now_ms as i64)
    .bind(enum_to_str(&status)?)
    .bind(now_ms as i64)
    .bind(enum_to_str(&status)?)
    .bind(now_ms as i64)
    .bind(id.as_str())
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(StorageError::not_found("mission", id.as_str()));
    }

    let row = sqlx::query("SELECT * FROM missions WHERE id = ?")
        .bind(id.as_str())
        .fetch_one(&mut *tx)
        .await?;
    let mission = mission_from_row(&row)?;

    let payload = EventPayload::MissionStatusChanged {
        id: id.clone(),
        status,
        completed_sorties: mission.completed_sorties,
    };
    append_in_tx(
        &mut *tx,
        stream_types::MISSION,
        id.as_str(),
        &payload,
        &NewEvent::default(),
        now_ms,
    )
    .await?;
    Ok(mission)
}

pub(crate) async fn set_sortie_status_in_tx(
    tx: &mut SqliteConnection,
    id: &SortieId,
    status: SortieStatus,
    assigned_to: Option<&SpecialistId>,
    now_ms: u64,
) -> Result<Sortie, StorageError> {
    let updated = sqlx::query(
        "UPDATE sorties SET status = ?,
                            assigned_to = COALESCE(?, assigned_to),
                            updated_at_ms = ?,
                            started_at_ms = CASE WHEN ? = 'in_progress'
                                                 THEN COALESCE(started_at_ms, ?)
                                                 ELSE started_at_ms END,
                            completed_at_ms = CASE WHEN ? IN ('completed', 'failed')
                                                   THEN COALESCE(completed_at_ms, ?)
                                                   ELSE completed_at_ms END
         WHERE id = ?",
    )
    .bind(enum_to_str(&status)?)
    .bind(assigned_to.map(|s| s.as_str().to_string()))
    .bind(now_ms as i64)
    .bind(enum_to_str(&status)?)
    .bind(now_ms as i64)
    .bind(enum_to_str(&status)?)
    .bind(now_ms as i64)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(StorageError::not_found("sortie", id.to_string()));
    }

    let payload = EventPayload::SortieStatusChanged {
        id: id.clone(),
        status,
        assigned_to: assigned_to.cloned(),
    };
    append_in_tx(
        &mut *tx,
        stream_types::MISSION,
        id.mission_id().as_str(),
        &payload,
        &NewEvent::default(),
        now_ms,
    )
    .await?;

    let row = sqlx::query("SELECT * FROM sorties WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;
    sortie_from_row(&row)
}

pub(crate) fn mission_from_row(row: &SqliteRow) -> Result<Mission, StorageError> {
    let strategy: String = row.try_get("strategy")?;
    let status: String = row.try_get("status")?;
    Ok(Mission {
        id: MissionId::from_string(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        strategy: enum_from_str("strategy", &strategy)?,
        status: enum_from_str("mission status", &status)?,
        total_sorties: row.try_get::<i64, _>("total_sorties")? as u32,
        completed_sorties: row.try_get::<i64, _>("completed_sorties")? as u32,
        created_at_ms: ms(row.try_get("created_at_ms")?),
        updated_at_ms: ms(row.try_get("updated_at_ms")?),
        started_at_ms: row.try_get::<Option<i64>, _>("started_at_ms")?.map(ms),
        completed_at_ms: row.try_get::<Option<i64>, _>("completed_at_ms")?.map(ms),
    })
}

pub(crate) fn sortie_from_row(row: &SqliteRow) -> Result<Sortie, StorageError> {
    let id: String = row.try_get("id")?;
    let id = SortieId::parse(&id).map_err(|_| StorageError::Corrupt("sortie id", id))?;
    let sortie_type: String = row.try_get("sortie_type")?;
    let status: String = row.try_get("status")?;
    let files: String = row.try_get("files")?;
    let new_files: String = row.try_get("new_files")?;
    let dependencies: String = row.try_get("dependencies")?;
    Ok(Sortie {
        mission_id: MissionId::from_string(row.try_get::<String, _>("mission_id")?),
        sortie_index: row.try_get::<i64, _>("sortie_index")? as u32,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        files: json_list("sortie files", &files)?,
        new_files: json_list("sortie new_files", &new_files)?,
        dependencies: json_list("sortie dependencies", &dependencies)?,
        complexity: row.try_get::<i64, _>("complexity")? as u8,
        sortie_type: enum_from_str("sortie type", &sortie_type)?,
        status: enum_from_str("sortie status", &status)?,
        assigned_to: row
            .try_get::<Option<String>, _>("assigned_to")?
            .map(SpecialistId::from_string),
        progress: row.try_get::<i64, _>("progress")? as u8,
        progress_notes: row.try_get("progress_notes")?,
        estimated_duration_ms: row
            .try_get::<Option<i64>, _>("estimated_duration_ms")?
            .map(ms),
        created_at_ms: ms(row.try_get("created_at_ms")?),
        updated_at_ms: ms(row.try_get("updated_at_ms")?),
        started_at_ms: row.try_get::<Option<i64>, _>("started_at_ms")?.map(ms),
        completed_at_ms: row.try_get::<Option<i64>, _>("completed_at_ms")?.map(ms),
        id,
    })
}

#[cfg(test)]
#[path = "missions_tests.rs"]
mod tests;
