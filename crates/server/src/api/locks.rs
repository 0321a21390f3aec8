// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock acquire/release/list endpoints.

use super::error::{ApiError, ApiResult};
use crate::coordinator::LockRequestOutcome;
use crate::lifecycle::ServerCtx;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ft_core::lock::{LockId, LockPurpose};
use ft_core::specialist::SpecialistId;
use ft_core::Clock;
use ft_storage::ReleaseOutcome;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    pub file: String,
    pub specialist_id: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_purpose")]
    pub purpose: LockPurpose,
}

fn default_purpose() -> LockPurpose {
    LockPurpose::Edit
}

pub async fn acquire<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<AcquireRequest>,
) -> ApiResult<Response> {
    if req.file.trim().is_empty() || req.specialist_id.trim().is_empty() {
        return Err(ApiError::bad_request("file and specialist_id are required"));
    }
    let specialist = SpecialistId::from_string(&req.specialist_id);
    let outcome = ctx
        .coordinator
        .acquire(&specialist, &req.file, req.purpose, req.timeout_ms)
        .await?;

    Ok(match outcome {
        LockRequestOutcome::Acquired(lock) => Json(json!({ "lock": lock })).into_response(),
        LockRequestOutcome::Queued { position, existing } => Json(json!({
            "conflict": true,
            "queued": true,
            "position": position,
            "existing_lock": existing,
        }))
        .into_response(),
        LockRequestOutcome::SelfConflict(existing) => (
            StatusCode::CONFLICT,
            Json(json!({
                "conflict": true,
                "existing_lock": existing,
                "error": "specialist already holds this file; release before re-acquiring",
                "code": "SELF_CONFLICT",
            })),
        )
            .into_response(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub lock_id: String,
    pub specialist_id: String,
    #[serde(default)]
    pub force: bool,
}

pub async fn release<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<ReleaseRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.lock_id.trim().is_empty() || req.specialist_id.trim().is_empty() {
        return Err(ApiError::bad_request("lock_id and specialist_id are required"));
    }
    let lock_id = LockId::from_string(&req.lock_id);
    let specialist = SpecialistId::from_string(&req.specialist_id);

    match ctx.coordinator.release(&lock_id, &specialist, req.force).await? {
        ReleaseOutcome::Released(lock) => Ok(Json(json!({ "lock": lock, "released": true }))),
        ReleaseOutcome::NotActive(lock) => Ok(Json(json!({ "lock": lock, "released": false }))),
        ReleaseOutcome::NotOwner(lock) => Err(ApiError::forbidden(format!(
            "lock {} is held by {}",
            lock.id, lock.reserved_by
        ))),
        ReleaseOutcome::NotFound => {
            Err(ApiError::not_found(format!("lock not found: {}", req.lock_id)))
        }
    }
}

pub async fn list<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
) -> ApiResult<Json<serde_json::Value>> {
    let locks = ctx.coordinator.active_locks().await?;
    Ok(Json(json!({ "locks": locks })))
}
