// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint CRUD and recovery endpoints.

use super::error::{ApiError, ApiResult};
use crate::lifecycle::ServerCtx;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ft_core::checkpoint::{CheckpointId, CheckpointTrigger};
use ft_core::mission::MissionId;
use ft_core::Clock;
use ft_storage::RetentionPolicy;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub mission_id: String,
    #[serde(default = "default_trigger")]
    pub trigger: CheckpointTrigger,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_trigger() -> CheckpointTrigger {
    CheckpointTrigger::Manual
}

fn default_created_by() -> String {
    "api".to_string()
}

pub async fn create<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    if req.mission_id.trim().is_empty() {
        return Err(ApiError::bad_request("mission_id is required"));
    }
    let mission_id = MissionId::from_string(&req.mission_id);
    let checkpoint = ctx
        .checkpoints
        .create(&mission_id, req.trigger, &req.created_by)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "checkpoint": checkpoint }))))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mission_id = query.mission_id.map(MissionId::from_string);
    let checkpoints = ctx
        .checkpoints
        .list(mission_id.as_ref(), query.limit.clamp(1, 500))
        .await?;
    let count = checkpoints.len();
    Ok(Json(json!({
        "checkpoints": checkpoints,
        "count": count,
    })))
}

pub async fn get<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let checkpoint_id = CheckpointId::from_string(&id);
    let checkpoint = ctx
        .checkpoints
        .get(&checkpoint_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("checkpoint not found: {}", id)))?;
    Ok(Json(json!({ "checkpoint": checkpoint })))
}

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub agent_id: String,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn recover<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
    Json(req): Json<RecoverRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.agent_id.trim().is_empty() {
        return Err(ApiError::bad_request("agent_id is required"));
    }
    let checkpoint_id = CheckpointId::from_string(&id);
    let outcome = ctx
        .recovery
        .recover(&checkpoint_id, &req.agent_id, req.dry_run)
        .await?;

    let mut body = json!({
        "success": outcome.success,
        "recovery_context": outcome.recovery_context,
    });
    if outcome.dry_run {
        body["dry_run"] = json!(true);
        body["would_restore"] = json!(outcome.report);
    } else {
        body["restored"] = json!(outcome.report);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize, Default)]
pub struct PruneRequest {
    #[serde(default)]
    pub older_than_days: Option<u32>,
    #[serde(default)]
    pub keep_per_mission: Option<u32>,
}

pub async fn prune<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    body: Option<Json<PruneRequest>>,
) -> ApiResult<Json<serde_json::Value>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let defaults = RetentionPolicy::default();
    let policy = RetentionPolicy {
        max_age_days: req.older_than_days.unwrap_or(defaults.max_age_days),
        keep_per_mission: req.keep_per_mission.unwrap_or(defaults.keep_per_mission),
    };
    let deleted = ctx.checkpoints.prune(Some(policy)).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
