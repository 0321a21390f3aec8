// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event store: append-only log keyed by `(stream_type, stream_id, seq)`.

use crate::error::StorageError;
use crate::store::{ms, Store};
use ft_core::event::{EventId, EventPayload, EventRecord, NewEvent, SCHEMA_VERSION};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Retries for the append race on a stream's next sequence number.
const APPEND_RETRIES: u32 = 3;

/// Compound filter for event queries.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub stream_type: Option<String>,
    pub stream_id: Option<String>,
    pub event_type: Option<String>,
    pub since_ms: Option<u64>,
}

impl Store {
    /// Append one event, allocating `sequence_number = max + 1` inside the
    /// transaction. A concurrent append to the same stream loses the
    /// unique-index race and is retried with a fresh sequence number.
    pub async fn append_event(
        &self,
        stream_type: &str,
        stream_id: &str,
        payload: &EventPayload,
        opts: NewEvent,
        now_ms: u64,
    ) -> Result<EventRecord, StorageError> {
        for _ in 0..APPEND_RETRIES {
            let mut tx = self.pool().begin().await?;
            match append_in_tx(&mut tx, stream_type, stream_id, payload, &opts, now_ms).await {
                Ok(record) => {
                    tx.commit().await?;
                    return Ok(record);
                }
                Err(e) if e.is_unique_violation() => {
                    tx.rollback().await?;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::AppendConflict(format!("{}/{}", stream_type, stream_id)))
    }

    /// Events of one stream in sequence order, optionally after an
    /// exclusive lower bound.
    pub async fn events_for_stream(
        &self,
        stream_type: &str,
        stream_id: &str,
        after: Option<i64>,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM events
             WHERE stream_type = ? AND stream_id = ? AND sequence_number > ?
             ORDER BY sequence_number ASC",
        )
        .bind(stream_type)
        .bind(stream_id)
        .bind(after.unwrap_or(0))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    pub async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE event_type = ?
             ORDER BY occurred_at_ms ASC, sequence_number ASC",
        )
        .bind(event_type)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    /// The highest-sequence event of a stream, if any.
    pub async fn latest_event(
        &self,
        stream_type: &str,
        stream_id: &str,
    ) -> Result<Option<EventRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM events WHERE stream_type = ? AND stream_id = ?
             ORDER BY sequence_number DESC LIMIT 1",
        )
        .bind(stream_type)
        .bind(stream_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    /// `occurred_at` of the newest event across every stream of a mission
    /// family (`stream_id` prefix match is not needed - mission activity is
    /// keyed on the mission stream itself).
    pub async fn latest_activity_ms(
        &self,
        stream_type: &str,
        stream_id: &str,
    ) -> Result<Option<u64>, StorageError> {
        let row = sqlx::query(
            "SELECT MAX(occurred_at_ms) AS last FROM events
             WHERE stream_type = ? AND stream_id = ?",
        )
        .bind(stream_type)
        .bind(stream_id)
        .fetch_one(self.pool())
        .await?;
        let last: Option<i64> = row.try_get("last")?;
        Ok(last.map(ms))
    }

    /// Compound filter query; all predicates are conjunctive.
    pub async fn events_filtered(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM events WHERE 1 = 1");
        if let Some(stream_type) = &filter.stream_type {
            qb.push(" AND stream_type = ").push_bind(stream_type.as_str());
        }
        if let Some(stream_id) = &filter.stream_id {
            qb.push(" AND stream_id = ").push_bind(stream_id.as_str());
        }
        if let Some(event_type) = &filter.event_type {
            qb.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        if let Some(since) = filter.since_ms {
            qb.push(" AND occurred_at_ms >= ").push_bind(since as i64);
        }
        qb.push(" ORDER BY occurred_at_ms ASC, sequence_number ASC");
        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(event_from_row).collect()
    }
}

/// Append inside an open transaction. Callers pair this with the matching
/// projection writes so both commit or neither does.
pub(crate) async fn append_in_tx(
    tx: &mut SqliteConnection,
    stream_type: &str,
    stream_id: &str,
    payload: &EventPayload,
    opts: &NewEvent,
    now_ms: u64,
) -> Result<EventRecord, StorageError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(sequence_number), 0) AS seq FROM events
         WHERE stream_type = ? AND stream_id = ?",
    )
    .bind(stream_type)
    .bind(stream_id)
    .fetch_one(&mut *tx)
    .await?;
    let next_seq: i64 = row.try_get::<i64, _>("seq")? + 1;

    let record = EventRecord {
        event_id: EventId::new(),
        stream_type: stream_type.to_string(),
        stream_id: stream_id.to_string(),
        sequence_number: next_seq,
        event_type: payload.event_type().to_string(),
        data: payload.to_data(),
        occurred_at_ms: opts.occurred_at_ms.unwrap_or(now_ms),
        recorded_at_ms: now_ms,
        causation_id: opts.causation_id.clone(),
        correlation_id: opts.correlation_id.clone(),
        metadata: opts.metadata.clone(),
        schema_version: SCHEMA_VERSION,
    };

    sqlx::query(
        "INSERT INTO events (event_id, stream_type, stream_id, sequence_number, event_type,
                             data, occurred_at_ms, recorded_at_ms, causation_id, correlation_id,
                             metadata, schema_version)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.event_id.as_str())
    .bind(&record.stream_type)
    .bind(&record.stream_id)
    .bind(record.sequence_number)
    .bind(&record.event_type)
    .bind(record.data.to_string())
    .bind(record.occurred_at_ms as i64)
    .bind(record.recorded_at_ms as i64)
    .bind(record.causation_id.as_deref())
    .bind(record.correlation_id.as_deref())
    .bind(record.metadata.as_ref().map(|m| m.to_string()))
    .bind(record.schema_version)
    .execute(&mut *tx)
    .await?;

    Ok(record)
}

pub(crate) fn event_from_row(row: &SqliteRow) -> Result<EventRecord, StorageError> {
    let data: String = row.try_get("data")?;
    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(EventRecord {
        event_id: EventId::from_string(row.try_get::<String, _>("event_id")?),
        stream_type: row.try_get("stream_type")?,
        stream_id: row.try_get("stream_id")?,
        sequence_number: row.try_get("sequence_number")?,
        event_type: row.try_get("event_type")?,
        data: serde_json::from_str(&data)?,
        occurred_at_ms: ms(row.try_get("occurred_at_ms")?),
        recorded_at_ms: ms(row.try_get("recorded_at_ms")?),
        causation_id: row.try_get("causation_id")?,
        correlation_id: row.try_get("correlation_id")?,
        metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
        schema_version: row.try_get("schema_version")?,
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
