// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox append/read and cursor endpoints.

use super::error::{ApiError, ApiResult};
use crate::lifecycle::ServerCtx;
use axum::extract::{Path, State};
use axum::Json;
use ft_core::event::stream_types;
use ft_core::Clock;
use ft_storage::MailboxEntry;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub stream_id: String,
    pub events: Vec<AppendEvent>,
}

#[derive(Debug, Deserialize)]
pub struct AppendEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub causation_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn append<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<AppendRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.stream_id.trim().is_empty() {
        return Err(ApiError::bad_request("stream_id is required"));
    }
    if req.events.is_empty() {
        return Err(ApiError::bad_request("events must be non-empty"));
    }
    if req.events.iter().any(|e| e.event_type.trim().is_empty()) {
        return Err(ApiError::bad_request("every event needs a type"));
    }

    let entries: Vec<MailboxEntry> = req
        .events
        .into_iter()
        .map(|e| MailboxEntry {
            event_type: e.event_type,
            data: e.data,
            causation_id: e.causation_id,
            metadata: e.metadata,
        })
        .collect();

    let now = ctx.clock.epoch_ms();
    let (mailbox, inserted) = ctx.store.mailbox_append(&req.stream_id, &entries, now).await?;
    let events = ctx
        .store
        .events_for_stream(stream_types::MAILBOX, &req.stream_id, None)
        .await?;

    Ok(Json(json!({
        "mailbox": {
            "id": mailbox.id,
            "created_at_ms": mailbox.created_at_ms,
            "updated_at_ms": mailbox.updated_at_ms,
            "events": events,
        },
        "inserted": inserted.len(),
    })))
}

pub async fn read<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(stream_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mailbox = ctx
        .store
        .get_mailbox(&stream_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("mailbox not found: {}", stream_id)))?;
    let events = ctx
        .store
        .events_for_stream(stream_types::MAILBOX, &stream_id, None)
        .await?;

    Ok(Json(json!({
        "mailbox": {
            "id": mailbox.id,
            "created_at_ms": mailbox.created_at_ms,
            "updated_at_ms": mailbox.updated_at_ms,
            "events": events,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct AdvanceCursorRequest {
    pub stream_id: String,
    pub position: i64,
    #[serde(default = "default_consumer")]
    pub consumer_id: String,
}

fn default_consumer() -> String {
    "default".to_string()
}

pub async fn advance_cursor<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<AdvanceCursorRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.stream_id.trim().is_empty() {
        return Err(ApiError::bad_request("stream_id is required"));
    }
    let now = ctx.clock.epoch_ms();
    let cursor = ctx
        .store
        .advance_cursor(&req.stream_id, &req.consumer_id, req.position, now)
        .await?;
    Ok(Json(json!({ "cursor": cursor })))
}

pub async fn get_cursor<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(cursor_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let cursor = ctx
        .store
        .get_cursor(&cursor_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cursor not found: {}", cursor_id)))?;
    Ok(Json(json!({ "cursor": cursor })))
}
