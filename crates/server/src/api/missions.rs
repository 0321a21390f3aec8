// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission and sortie endpoints, including planner-output intake.

use super::error::{ApiError, ApiResult};
use crate::lifecycle::ServerCtx;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ft_core::mission::{Mission, MissionId, MissionStatus, Strategy};
use ft_core::sortie::{Sortie, SortieId, SortieStatus};
use ft_core::specialist::SpecialistId;
use ft_core::validate::{validate_sortie_tree, SortieDraft};
use ft_core::{path::canonical_path, Clock};
use ft_storage::{MissionFilter, NewMission};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct DecomposeRequest {
    pub task: String,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default)]
    pub context: Option<String>,
    /// The planner's sortie tree; the core consumes it as data.
    #[serde(default)]
    pub sorties: Vec<SortieDraft>,
}

fn default_strategy() -> Strategy {
    Strategy::FeatureBased
}

pub async fn decompose<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Json(req): Json<DecomposeRequest>,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    if req.task.trim().is_empty() {
        return Err(ApiError::bad_request("task is required"));
    }

    // Nothing persists on a validation failure.
    let errors = validate_sortie_tree(&req.sorties);
    if !errors.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "errors": errors })),
        )
            .into_response());
    }

    let now = ctx.clock.epoch_ms();
    let mission_id = MissionId::new();
    let mission = Mission {
        id: mission_id.clone(),
        title: req.task.clone(),
        description: req.context.unwrap_or_default(),
        strategy: req.strategy,
        status: MissionStatus::Pending,
        total_sorties: req.sorties.len() as u32,
        completed_sorties: 0,
        created_at_ms: now,
        updated_at_ms: now,
        started_at_ms: None,
        completed_at_ms: None,
    };
    let sorties: Vec<Sortie> = req
        .sorties
        .iter()
        .enumerate()
        .map(|(index, draft)| Sortie {
            id: SortieId::new(mission_id.clone(), index as u32),
            mission_id: mission_id.clone(),
            sortie_index: index as u32,
            title: draft.title.clone(),
            description: draft.description.clone(),
            files: draft.files.iter().map(|f| canonical_path(f)).collect(),
            new_files: draft.new_files.iter().map(|f| canonical_path(f)).collect(),
            dependencies: draft.dependencies.clone(),
            complexity: draft.complexity,
            sortie_type: draft.sortie_type,
            status: SortieStatus::Pending,
            assigned_to: None,
            progress: 0,
            progress_notes: None,
            estimated_duration_ms: draft.estimated_duration_ms,
            created_at_ms: now,
            updated_at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
        })
        .collect();

    ctx.store
        .create_mission(&NewMission { mission: mission.clone(), sorties: sorties.clone() }, now)
        .await?;

    // Bring the dispatcher up so the first cohort starts immediately.
    let dispatcher = ctx.dispatch.ensure(&mission_id);
    dispatcher.initialize().await?;

    let mission = ctx
        .store
        .get_mission(&mission_id)
        .await?
        .unwrap_or(mission);
    let sorties = ctx.store.sorties_for_mission(&mission_id, None).await?;

    Ok(Json(json!({
        "success": true,
        "sortie_tree": {
            "mission": mission,
            "sorties": sorties,
        },
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<MissionStatus>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = ctx
        .store
        .list_missions(&MissionFilter {
            status: query.status,
            strategy: query.strategy,
            limit: query.limit.clamp(1, 500),
            offset: query.offset.max(0),
        })
        .await?;
    Ok(Json(json!({
        "missions": page.missions,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

pub async fn get<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mission_id = MissionId::from_string(&id);
    let mission = ctx
        .store
        .get_mission(&mission_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("mission not found: {}", id)))?;
    Ok(Json(json!({ "mission": mission })))
}

#[derive(Debug, Deserialize)]
pub struct SortiesQuery {
    #[serde(default)]
    pub status: Option<SortieStatus>,
}

pub async fn sorties<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
    Query(query): Query<SortiesQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let mission_id = MissionId::from_string(&id);
    if ctx.store.get_mission(&mission_id).await?.is_none() {
        return Err(ApiError::not_found(format!("mission not found: {}", id)));
    }
    let all = ctx.store.sorties_for_mission(&mission_id, None).await?;

    let completed: Vec<u32> = all
        .iter()
        .filter(|s| s.status == SortieStatus::Completed)
        .map(|s| s.sortie_index)
        .collect();
    let parallelizable: Vec<u32> = all
        .iter()
        .filter(|s| s.is_ready(&completed))
        .map(|s| s.sortie_index)
        .collect();
    let blocked: Vec<u32> = all
        .iter()
        .filter(|s| {
            s.status == SortieStatus::Blocked
                || (s.status == SortieStatus::Pending && !s.is_ready(&completed))
        })
        .map(|s| s.sortie_index)
        .collect();

    let sorties: Vec<&Sortie> = match query.status {
        Some(status) => all.iter().filter(|s| s.status == status).collect(),
        None => all.iter().collect(),
    };

    Ok(Json(json!({
        "sorties": sorties,
        "parallelizable": parallelizable,
        "blocked": blocked,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PatchMissionRequest {
    #[serde(default)]
    pub status: Option<MissionStatus>,
}

pub async fn patch<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
    Json(req): Json<PatchMissionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mission_id = MissionId::from_string(&id);
    let Some(status) = req.status else {
        return Err(ApiError::bad_request("nothing to update"));
    };

    let mission = match status {
        MissionStatus::Cancelled => {
            let dispatcher = ctx.dispatch.ensure(&mission_id);
            dispatcher.cancel().await?;
            ctx.store
                .get_mission(&mission_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("mission not found: {}", id)))?
        }
        other => {
            ctx.store
                .set_mission_status(&mission_id, other, ctx.clock.epoch_ms())
                .await?
        }
    };
    Ok(Json(json!({ "mission": mission })))
}

#[derive(Debug, Deserialize)]
pub struct PatchSortieRequest {
    #[serde(default)]
    pub status: Option<SortieStatus>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

pub async fn patch_sortie<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
    Json(req): Json<PatchSortieRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let sortie_id = SortieId::parse(&id)
        .map_err(|_| ApiError::bad_request(format!("invalid sortie id: {}", id)))?;
    if req.status.is_none() && req.assigned_to.is_none() {
        return Err(ApiError::bad_request("nothing to update"));
    }

    let current = ctx
        .store
        .get_sortie(&sortie_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("sortie not found: {}", id)))?;
    let status = req.status.unwrap_or(current.status);
    let assigned = req.assigned_to.map(SpecialistId::from_string);

    let sortie = ctx
        .store
        .set_sortie_status(&sortie_id, status, assigned.as_ref(), ctx.clock.epoch_ms())
        .await?;
    Ok(Json(json!({ "sortie": sortie })))
}

pub async fn remove<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mission_id = MissionId::from_string(&id);
    if let Some(dispatcher) = ctx.dispatch.get(&mission_id) {
        // Free held locks before the rows disappear.
        let _ = dispatcher.cancel().await;
        ctx.dispatch.remove(&mission_id);
    }
    ctx.store.delete_mission(&mission_id, ctx.clock.epoch_ms()).await?;
    ctx.checkpoints.remove_backups(&mission_id);
    Ok(StatusCode::NO_CONTENT)
}
