// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailboxes (named event streams) and consumer cursors.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::store::{ms, Store};
use ft_core::event::{stream_types, EventPayload, EventRecord, NewEvent};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// A named event stream used for inter-component messaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mailbox {
    pub id: String,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// A consumer's read position on a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    pub stream_id: String,
    pub consumer_id: String,
    pub position: i64,
    pub updated_at_ms: u64,
}

/// One entry of a mailbox append request.
#[derive(Debug, Clone)]
pub struct MailboxEntry {
    pub event_type: String,
    pub data: serde_json::Value,
    pub causation_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Store {
    /// Append events to a mailbox stream, creating the mailbox lazily.
    ///
    /// One transaction covers the mailbox upsert and every event insert, so
    /// a failed entry leaves nothing behind.
    pub async fn mailbox_append(
        &self,
        stream_id: &str,
        entries: &[MailboxEntry],
        now_ms: u64,
    ) -> Result<(Mailbox, Vec<EventRecord>), StorageError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO mailboxes (id, created_at_ms, updated_at_ms) VALUES (?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET updated_at_ms = excluded.updated_at_ms",
        )
        .bind(stream_id)
        .bind(now_ms as i64)
        .bind(now_ms as i64)
        .execute(&mut *tx)
        .await?;

        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            let payload = EventPayload::from_stored(&entry.event_type, &entry.data);
            let opts = NewEvent {
                occurred_at_ms: None,
                causation_id: entry.causation_id.clone(),
                correlation_id: None,
                metadata: entry.metadata.clone(),
            };
            let record =
                append_in_tx(&mut tx, stream_types::MAILBOX, stream_id, &payload, &opts, now_ms)
                    .await?;
            inserted.push(record);
        }

        tx.commit().await?;

        let mailbox = self
            .get_mailbox(stream_id)
            .await?
            .ok_or_else(|| StorageError::not_found("mailbox", stream_id))?;
        Ok((mailbox, inserted))
    }

    pub async fn get_mailbox(&self, stream_id: &str) -> Result<Option<Mailbox>, StorageError> {
        let row = sqlx::query("SELECT * FROM mailboxes WHERE id = ?")
            .bind(stream_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|row| {
            Ok::<_, sqlx::Error>(Mailbox {
                id: row.try_get("id")?,
                created_at_ms: ms(row.try_get("created_at_ms")?),
                updated_at_ms: ms(row.try_get("updated_at_ms")?),
            })
        })
        .transpose()?)
    }

    pub async fn count_mailboxes(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM mailboxes")
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Upsert a consumer's position on a stream. The mailbox must exist.
    pub async fn advance_cursor(
        &self,
        stream_id: &str,
        consumer_id: &str,
        position: i64,
        now_ms: u64,
    ) -> Result<Cursor, StorageError> {
        if self.get_mailbox(stream_id).await?.is_none() {
            return Err(StorageError::not_found("mailbox", stream_id));
        }

        let mut tx = self.pool().begin().await?;
        let id = format!("cur-{}:{}", stream_id, consumer_id);
        sqlx::query(
            "INSERT INTO cursors (id, stream_id, consumer_id, position, updated_at_ms)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (stream_id, consumer_id)
             DO UPDATE SET position = excluded.position, updated_at_ms = excluded.updated_at_ms",
        )
        .bind(&id)
        .bind(stream_id)
        .bind(consumer_id)
        .bind(position)
        .bind(now_ms as i64)
        .execute(&mut *tx)
        .await?;

        let payload = EventPayload::CursorAdvanced {
            stream_id: stream_id.to_string(),
            consumer_id: consumer_id.to_string(),
            position,
        };
        append_in_tx(
            &mut tx,
            stream_types::SYSTEM,
            "cursors",
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;

        self.get_cursor(&id)
            .await?
            .ok_or_else(|| StorageError::not_found("cursor", id))
    }

    pub async fn get_cursor(&self, cursor_id: &str) -> Result<Option<Cursor>, StorageError> {
        let row = sqlx::query("SELECT * FROM cursors WHERE id = ?")
            .bind(cursor_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row
            .map(|row| {
                Ok::<_, sqlx::Error>(Cursor {
                    id: row.try_get("id")?,
                    stream_id: row.try_get("stream_id")?,
                    consumer_id: row.try_get("consumer_id")?,
                    position: row.try_get("position")?,
                    updated_at_ms: ms(row.try_get("updated_at_ms")?),
                })
            })
            .transpose()?)
    }
}

#[cfg(test)]
#[path = "mailboxes_tests.rs"]
mod tests;
