// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness and coordinator summary endpoints.

use super::error::ApiResult;
use crate::lifecycle::ServerCtx;
use axum::extract::State;
use axum::Json;
use ft_core::Clock;
use serde_json::json;
use std::sync::Arc;

pub async fn health<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "fleetd",
        "timestamp": ctx.clock.epoch_ms(),
    }))
}

pub async fn coordinator_status<C: Clock>(
    State(ctx): State<Arc<ServerCtx<C>>>,
) -> ApiResult<Json<serde_json::Value>> {
    let active_mailboxes = ctx.store.count_mailboxes().await?;
    let active_locks = ctx.store.active_locks().await?;
    let recent_conflicts = ctx.store.recent_conflicts(50).await?;
    Ok(Json(json!({
        "active_mailboxes": active_mailboxes,
        "active_locks": active_locks.len(),
        "queued_waiters": ctx.coordinator.queued_waiters(),
        "recent_conflicts": recent_conflicts.len(),
        "timestamp": ctx.clock.epoch_ms(),
    })))
}
