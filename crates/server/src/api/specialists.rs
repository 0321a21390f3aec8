// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Specialist tool endpoints: the narrow contracts agent runners use.
//!
//! Six operations - register, reserve, progress, complete, blocked,
//! squawk - each returning a small typed status plus whatever hints the
//! caller needs to proceed.

use super::error::{ApiError, ApiResult};
use crate::coordinator::LockRequestOutcome;
use crate::lifecycle::ServerCtx;
use crate::recovery::render_recovery_prompt;
use axum::extract::State;
use axum::Json;
use ft_core::blocker::{BlockerKind, BlockerReport};
use ft_core::lock::LockPurpose;
use ft_core::message::{Message, MessageId};
use ft_core::mission::MissionId;
use ft_core::sortie::SortieId;
use ft_core::specialist::{Specialist, SpecialistId, SpecialistStatus};
use ft_core::Clock;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub specialist_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub sortie_id: Option<String>,
}

/// Announce readiness. A re-registering specialist whose mission has an
/// unconsumed checkpoint gets the recovery context back for self-injection.
pub async fn register<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let now = ctx.clock.epoch_ms();
    let id = match &req.specialist_id {
        Some(id) => SpecialistId::from_string(id),
        None => SpecialistId::new(),
    };
    // Keep the dispatcher binding when a spawned specialist checks in.
    let existing = ctx.store.get_specialist(&id).await?;
    let previously_known = existing.is_some();

    let sortie_id = req
        .sortie_id
        .as_deref()
        .map(SortieId::parse)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let mission_id = req
        .mission_id
        .map(MissionId::from_string)
        .or_else(|| sortie_id.as_ref().map(|s| s.mission_id().clone()));
    let specialist = Specialist {
        id: id.clone(),
        name: req.name,
        capabilities: req.capabilities,
        status: SpecialistStatus::Registered,
        last_heartbeat_ms: now,
        mission_id: mission_id.clone().or_else(|| existing.as_ref().and_then(|s| s.mission_id.clone())),
        sortie_id: sortie_id.or_else(|| existing.as_ref().and_then(|s| s.sortie_id.clone())),
        progress_percent: existing.as_ref().map(|s| s.progress_percent).unwrap_or(0),
        registered_at_ms: existing.as_ref().map(|s| s.registered_at_ms).unwrap_or(now),
    };
    ctx.store.insert_specialist(&specialist, false, now).await?;

    let mut body = json!({
        "status": "registered",
        "specialist_id": specialist.id,
    });
    if let Some(sortie_id) = &specialist.sortie_id {
        body["sortie_id"] = json!(sortie_id);
    }

    if previously_known {
        if let Some(mission_id) = &specialist.mission_id {
            if let Some(checkpoint) =
                ctx.store.latest_unconsumed_checkpoint(mission_id).await?
            {
                body["recovery_context"] =
                    json!(render_recovery_prompt(&checkpoint, &Default::default()));
                body["checkpoint_id"] = json!(checkpoint.id);
            }
        }
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub specialist_id: String,
    pub file: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_purpose")]
    pub purpose: LockPurpose,
}

fn default_purpose() -> LockPurpose {
    LockPurpose::Edit
}

/// Reserve a file before editing it.
pub async fn reserve<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<ReserveRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.file.trim().is_empty() || req.specialist_id.trim().is_empty() {
        return Err(ApiError::bad_request("file and specialist_id are required"));
    }
    let specialist = SpecialistId::from_string(&req.specialist_id);
    ctx.store.touch_specialist(&specialist, ctx.clock.epoch_ms()).await.ok();

    let outcome = ctx
        .coordinator
        .acquire(&specialist, &req.file, req.purpose, req.timeout_ms)
        .await?;
    Ok(Json(match outcome {
        LockRequestOutcome::Acquired(lock) => json!({
            "status": "reserved",
            "lock": lock,
        }),
        LockRequestOutcome::Queued { position, existing } => json!({
            "status": "queued",
            "position": position,
            "existing_lock": existing,
            "retry_hint": "poll /api/v1/locks or retry after the holder's expiry",
        }),
        LockRequestOutcome::SelfConflict(existing) => json!({
            "status": "conflict",
            "existing_lock": existing,
            "retry_hint": "already holding this file; release before re-acquiring",
        }),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub specialist_id: String,
    pub progress: u8,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Report progress (doubles as the heartbeat).
pub async fn progress<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let specialist_id = SpecialistId::from_string(&req.specialist_id);
    let specialist = ctx
        .store
        .get_specialist(&specialist_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("specialist not found: {}", req.specialist_id)))?;

    match specialist.mission_id.as_ref().map(|m| ctx.dispatch.ensure(m)) {
        Some(dispatcher) => {
            dispatcher
                .on_progress(&specialist_id, req.progress, req.notes.as_deref())
                .await?;
        }
        None => {
            ctx.store.touch_specialist(&specialist_id, ctx.clock.epoch_ms()).await?;
            ctx.store.set_specialist_progress(&specialist_id, req.progress).await?;
        }
    }
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub specialist_id: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Report the sortie complete.
pub async fn complete<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let specialist_id = SpecialistId::from_string(&req.specialist_id);
    let specialist = ctx
        .store
        .get_specialist(&specialist_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("specialist not found: {}", req.specialist_id)))?;
    let mission_id = specialist
        .mission_id
        .clone()
        .ok_or_else(|| ApiError::bad_request("specialist has no mission binding"))?;

    let dispatcher = ctx.dispatch.ensure(&mission_id);
    let mission = dispatcher.on_complete(&specialist_id).await?;

    if let Some(result) = &req.result {
        tracing::debug!(specialist = %specialist_id, result = %result, "completion result");
    }
    Ok(Json(json!({
        "status": "completed",
        "mission_status": mission.status,
        "completed_sorties": mission.completed_sorties,
        "total_sorties": mission.total_sorties,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BlockedRequest {
    pub specialist_id: String,
    pub kind: BlockerKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub affected_sortie: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Report a blocker and receive the resolution decision.
pub async fn blocked<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<BlockedRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let specialist_id = SpecialistId::from_string(&req.specialist_id);
    let specialist = ctx
        .store
        .get_specialist(&specialist_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("specialist not found: {}", req.specialist_id)))?;
    let mission_id = specialist
        .mission_id
        .clone()
        .ok_or_else(|| ApiError::bad_request("specialist has no mission binding"))?;

    let affected_sortie = req
        .affected_sortie
        .as_deref()
        .map(SortieId::parse)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let report = BlockerReport {
        kind: req.kind,
        description: req.description,
        affected_sortie,
        file: req.file,
    };

    let dispatcher = ctx.dispatch.ensure(&mission_id);
    let resolution = dispatcher.on_blocker(&specialist_id, &report).await?;
    Ok(Json(json!(resolution)))
}

#[derive(Debug, Deserialize)]
pub struct SquawkRequest {
    pub specialist_id: String,
    /// Recipients; present means "send".
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Exchange messages: optionally send one, always drain the inbox.
pub async fn squawk<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<SquawkRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let specialist_id = SpecialistId::from_string(&req.specialist_id);
    let now = ctx.clock.epoch_ms();
    ctx.store.touch_specialist(&specialist_id, now).await.ok();

    let sent = if req.to.is_empty() {
        None
    } else {
        let message = Message {
            id: MessageId::new(),
            from: specialist_id.clone(),
            to: req.to.iter().map(SpecialistId::from_string).collect(),
            subject: req.subject.clone(),
            payload: req.payload.clone(),
            sent_at_ms: now,
            delivered: false,
        };
        ctx.store.enqueue_message(&message, now).await?;
        Some(message.id)
    };

    let inbox = ctx.store.messages_for(&specialist_id).await?;
    for message in &inbox {
        ctx.store.mark_message_delivered(&message.id, now).await?;
    }

    Ok(Json(json!({
        "status": "ok",
        "sent": sent,
        "messages": inbox,
    })))
}
