// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock projections: conditional acquire, owner release, expiry, conflicts.
//!
//! The partial unique index on `(file) WHERE status = 'active'` is the hard
//! backstop for the one-active-lock-per-file invariant; the conditional
//! logic here exists to give callers useful outcomes instead of raw
//! constraint violations.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::store::{enum_from_str, enum_to_str, ms, Store};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::lock::{Lock, LockId, LockPurpose, LockStatus};
use ft_core::specialist::SpecialistId;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Acquired(Lock),
    /// Someone (possibly the requester itself) holds a live lock.
    Conflict(Lock),
}

/// Result of a release attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Released(Lock),
    /// Already released/expired - release is idempotent, this is a no-op.
    NotActive(Lock),
    /// Caller is not the owner (and did not force).
    NotOwner(Lock),
    NotFound,
}

/// A denied acquisition, retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockConflict {
    pub file: String,
    pub held_by: SpecialistId,
    pub holder_expires_at_ms: u64,
    pub requested_by: SpecialistId,
    pub occurred_at_ms: u64,
}

impl Store {
    /// Attempt to acquire an exclusive lock on a canonical path.
    ///
    /// Expired-but-active locks on the path are swept inside the same
    /// transaction, so a dead holder never blocks a new acquire. A denial
    /// records a conflict row.
    pub async fn try_acquire_lock(
        &self,
        specialist: &SpecialistId,
        file: &str,
        purpose: LockPurpose,
        timeout_ms: u64,
        now_ms: u64,
    ) -> Result<AcquireOutcome, StorageError> {
        let mut tx = self.pool().begin().await?;

        expire_file_in_tx(&mut tx, file, now_ms).await?;

        let existing = sqlx::query("SELECT * FROM locks WHERE file = ? AND status = 'active'")
            .bind(file)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            let holder = lock_from_row(&row)?;
            sqlx::query(
                "INSERT INTO lock_conflicts (file, held_by, holder_expires_at_ms, requested_by,
                                             occurred_at_ms)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(file)
            .bind(holder.reserved_by.as_str())
            .bind(holder.expires_at_ms as i64)
            .bind(specialist.as_str())
            .bind(now_ms as i64)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(AcquireOutcome::Conflict(holder));
        }

        let lock = Lock {
            id: LockId::new(),
            file: file.to_string(),
            reserved_by: specialist.clone(),
            reserved_at_ms: now_ms,
            expires_at_ms: now_ms + timeout_ms,
            released_at_ms: None,
            purpose,
            timeout_ms,
            checksum: None,
            status: LockStatus::Active,
        };
        insert_lock_in_tx(&mut tx, &lock).await?;

        let payload = EventPayload::LockAcquired {
            id: lock.id.clone(),
            file: lock.file.clone(),
            reserved_by: specialist.clone(),
            expires_at_ms: lock.expires_at_ms,
            purpose,
        };
        append_in_tx(&mut tx, stream_types::LOCK, file, &payload, &NewEvent::default(), now_ms)
            .await?;

        tx.commit().await?;
        Ok(AcquireOutcome::Acquired(lock))
    }

    /// Release a lock. Owner-only unless `force`; idempotent on non-active
    /// locks.
    pub async fn release_lock(
        &self,
        lock_id: &LockId,
        specialist: &SpecialistId,
        force: bool,
        now_ms: u64,
    ) -> Result<ReleaseOutcome, StorageError> {
        let mut tx = self.pool().begin().await?;
        let row = sqlx::query("SELECT * FROM locks WHERE id = ?")
            .bind(lock_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(ReleaseOutcome::NotFound);
        };
        let lock = lock_from_row(&row)?;

        if lock.status != LockStatus::Active {
            return Ok(ReleaseOutcome::NotActive(lock));
        }
        if !force && lock.reserved_by != *specialist {
            return Ok(ReleaseOutcome::NotOwner(lock));
        }

        let status = if force { LockStatus::ForceReleased } else { LockStatus::Released };
        sqlx::query("UPDATE locks SET status = ?, released_at_ms = ? WHERE id = ?")
            .bind(enum_to_str(&status)?)
            .bind(now_ms as i64)
            .bind(lock_id.as_str())
            .execute(&mut *tx)
            .await?;

        let payload = if force {
            EventPayload::LockForceReleased { id: lock.id.clone(), file: lock.file.clone() }
        } else {
            EventPayload::LockReleased {
                id: lock.id.clone(),
                file: lock.file.clone(),
                released_by: specialist.clone(),
            }
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
        tx.commit().await?;

        let mut released = lock;
        released.status = status;
        released.released_at_ms = Some(now_ms);
        Ok(ReleaseOutcome::Released(released))
    }

    /// Release every active lock held by a specialist; returns the files
    /// freed so the coordinator can kick their queues.
    pub async fn release_locks_held_by(
        &self,
        specialist: &SpecialistId,
        now_ms: u64,
    ) -> Result<Vec<String>, StorageError> {
        let held = self.locks_held_by(specialist).await?;
        let mut files = Vec::with_capacity(held.len());
        for lock in held {
            if let ReleaseOutcome::Released(l) =
                self.release_lock(&lock.id, specialist, false, now_ms).await?
            {
                files.push(l.file);
            }
        }
        Ok(files)
    }

    /// Mark every overdue active lock expired; returns the expired locks.
    pub async fn expire_due_locks(&self, now_ms: u64) -> Result<Vec<Lock>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM locks WHERE status = 'active' AND expires_at_ms < ? AND released_at_ms IS NULL",
        )
        .bind(now_ms as i64)
        .fetch_all(self.pool())
        .await?;

        let mut expired = Vec::with_capacity(rows.len());
        for row in &rows {
            let lock = lock_from_row(row)?;
            let mut tx = self.pool().begin().await?;
            expire_file_in_tx(&mut tx, &lock.file, now_ms).await?;
            tx.commit().await?;
            let mut lock = lock;
            lock.status = LockStatus::Expired;
            expired.push(lock);
        }
        Ok(expired)
    }

    pub async fn get_lock(&self, id: &LockId) -> Result<Option<Lock>, StorageError> {
        let row = sqlx::query("SELECT * FROM locks WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(lock_from_row).transpose()
    }

    pub async fn active_locks(&self) -> Result<Vec<Lock>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM locks WHERE status = 'active' ORDER BY reserved_at_ms ASC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(lock_from_row).collect()
    }

    pub async fn active_lock_for_file(&self, file: &str) -> Result<Option<Lock>, StorageError> {
        let row = sqlx::query("SELECT * FROM locks WHERE file = ? AND status = 'active'")
            .bind(file)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(lock_from_row).transpose()
    }

    pub async fn locks_held_by(
        &self,
        specialist: &SpecialistId,
    ) -> Result<Vec<Lock>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM locks WHERE reserved_by = ? AND status = 'active'
             ORDER BY reserved_at_ms ASC",
        )
        .bind(specialist.as_str())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(lock_from_row).collect()
    }

    /// Recent conflict diagnostics, newest first.
    pub async fn recent_conflicts(&self, limit: i64) -> Result<Vec<LockConflict>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM lock_conflicts ORDER BY occurred_at_ms DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|row| {
                Ok(LockConflict {
                    file: row.try_get("file")?,
                    held_by: SpecialistId::from_string(row.try_get::<String, _>("held_by")?),
                    holder_expires_at_ms: ms(row.try_get("holder_expires_at_ms")?),
                    requested_by: SpecialistId::from_string(
                        row.try_get::<String, _>("requested_by")?,
                    ),
                    occurred_at_ms: ms(row.try_get("occurred_at_ms")?),
                })
            })
            .collect()
    }

    /// Drop conflict records older than the horizon; returns rows removed.
    pub async fn prune_conflicts(&self, older_than_ms: u64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM lock_conflicts WHERE occurred_at_ms < ?")
            .bind(older_than_ms as i64)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

/// Expire overdue active locks for one file inside an open transaction,
/// emitting a `lock:expired` event per lock.
pub(crate) async fn expire_file_in_tx(
    tx: &mut SqliteConnection,
    file: &str,
    now_ms: u64,
) -> Result<(), StorageError> {
    let rows = sqlx::query(
        "SELECT id FROM locks WHERE file = ? AND status = 'active' AND expires_at_ms < ?",
    )
    .bind(file)
    .bind(now_ms as i64)
    .fetch_all(&mut *tx)
    .await?;

    for row in rows {
        let id: String = row.try_get("id")?;
        sqlx::query("UPDATE locks SET status = 'expired' WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let payload = EventPayload::LockExpired {
            id: LockId::from_string(&id),
            file: file.to_string(),
        };
        append_in_tx(&mut *tx, stream_types::LOCK, file, &payload, &NewEvent::default(), now_ms)
            .await?;
    }
    Ok(())
}

pub(crate) async fn insert_lock_in_tx(
    tx: &mut SqliteConnection,
    lock: &Lock,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO locks (id, file, reserved_by, reserved_at_ms, expires_at_ms, released_at_ms,
                            purpose, timeout_ms, checksum, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(lock.id.as_str())
    .bind(&lock.file)
    .bind(lock.reserved_by.as_str())
    .bind(lock.reserved_at_ms as i64)
    .bind(lock.expires_at_ms as i64)
    .bind(lock.released_at_ms.map(|v| v as i64))
    .bind(enum_to_str(&lock.purpose)?)
    .bind(lock.timeout_ms as i64)
    .bind(lock.checksum.as_deref())
    .bind(enum_to_str(&lock.status)?)
    .execute(tx)
    .await?;
    Ok(())
}

pub(crate) fn lock_from_row(row: &SqliteRow) -> Result<Lock, StorageError> {
    let purpose: String = row.try_get("purpose")?;
    let status: String = row.try_get("status")?;
    Ok(Lock {
        id: LockId::from_string(row.try_get::<String, _>("id")?),
        file: row.try_get("file")?,
        reserved_by: SpecialistId::from_string(row.try_get::<String, _>("reserved_by")?),
        reserved_at_ms: ms(row.try_get("reserved_at_ms")?),
        expires_at_ms: ms(row.try_get("expires_at_ms")?),
        released_at_ms: row.try_get::<Option<i64>, _>("released_at_ms")?.map(ms),
        purpose: enum_from_str("lock purpose", &purpose)?,
        timeout_ms: ms(row.try_get("timeout_ms")?),
        checksum: row.try_get("checksum")?,
        status: enum_from_str("lock status", &status)?,
    })
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
