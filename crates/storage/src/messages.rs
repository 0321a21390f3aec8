// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inter-specialist message projections.

use crate::error::StorageError;
use crate::events::append_in_tx;
use crate::store::{json_list, ms, Store};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::message::{Message, MessageId};
use ft_core::specialist::SpecialistId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Store {
    /// Enqueue a message. Idempotent on `id`: requeueing an already-queued
    /// message (recovery) is a no-op and emits nothing.
    pub async fn enqueue_message(
        &self,
        message: &Message,
        now_ms: u64,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool().begin().await?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO messages (id, from_specialist, to_specialists, subject,
                                             payload, sent_at_ms, delivered)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.as_str())
        .bind(message.from.as_str())
        .bind(serde_json::to_string(&message.to)?)
        .bind(&message.subject)
        .bind(message.payload.to_string())
        .bind(message.sent_at_ms as i64)
        .bind(message.delivered)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(false);
        }

        let payload = EventPayload::MessageSent {
            id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            subject: message.subject.clone(),
        };
        append_in_tx(
            &mut tx,
            stream_types::SPECIALIST,
            message.from.as_str(),
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Undelivered messages addressed to a specialist, oldest first.
    pub async fn messages_for(
        &self,
        specialist: &SpecialistId,
    ) -> Result<Vec<Message>, StorageError> {
        // Recipient lists are small JSON arrays; filter in Rust.
        let all = self.pending_messages().await?;
        Ok(all
            .into_iter()
            .filter(|m| m.to.iter().any(|t| t == specialist))
            .collect())
    }

    /// All undelivered messages, oldest first.
    pub async fn pending_messages(&self) -> Result<Vec<Message>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE delivered = 0 ORDER BY sent_at_ms ASC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    /// Mark a message delivered on consumer receipt.
    pub async fn mark_message_delivered(
        &self,
        id: &MessageId,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;
        let updated = sqlx::query("UPDATE messages SET delivered = 1 WHERE id = ? AND delivered = 0")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            // Unknown or already delivered - either way, nothing to record.
            return Ok(());
        }
        let payload = EventPayload::MessageDelivered { id: id.clone() };
        append_in_tx(
            &mut tx,
            stream_types::SYSTEM,
            "messages",
            &payload,
            &NewEvent::default(),
            now_ms,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

pub(crate) fn message_from_row(row: &SqliteRow) -> Result<Message, StorageError> {
    let to: String = row.try_get("to_specialists")?;
    let payload: String = row.try_get("payload")?;
    Ok(Message {
        id: MessageId::from_string(row.try_get::<String, _>("id")?),
        from: SpecialistId::from_string(row.try_get::<String, _>("from_specialist")?),
        to: json_list("message recipients", &to)?,
        subject: row.try_get("subject")?,
        payload: serde_json::from_str(&payload)?,
        sent_at_ms: ms(row.try_get("sent_at_ms")?),
        delivered: row.try_get("delivered")?,
    })
}
