// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API surface.
//!
//! JSON in, JSON out; permissive CORS; every route carries the tracing and
//! request-timeout layers. Handlers are generic over the clock so the full
//! surface is drivable in tests with a fake clock.

mod checkpoints;
mod error;
mod locks;
mod mailbox;
mod missions;
mod specialists;
mod status;

pub use error::{ApiError, ApiResult};

use crate::lifecycle::ServerCtx;
use axum::routing::{get, patch, post};
use axum::Router;
use ft_core::Clock;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the full router over a server context.
pub fn router<C: Clock>(ctx: Arc<ServerCtx<C>>) -> Router {
    Router::new()
        .route("/health", get(status::health::<C>))
        .route("/api/v1/coordinator/status", get(status::coordinator_status::<C>))
        .route("/api/v1/mailbox/append", post(mailbox::append::<C>))
        .route("/api/v1/mailbox/{stream_id}", get(mailbox::read::<C>))
        .route("/api/v1/cursor/advance", post(mailbox::advance_cursor::<C>))
        .route("/api/v1/cursor/{cursor_id}", get(mailbox::get_cursor::<C>))
        .route("/api/v1/lock/acquire", post(locks::acquire::<C>))
        .route("/api/v1/lock/release", post(locks::release::<C>))
        .route("/api/v1/locks", get(locks::list::<C>))
        .route("/api/v1/missions/decompose", post(missions::decompose::<C>))
        .route("/api/v1/missions", get(missions::list::<C>))
        .route(
            "/api/v1/missions/{id}",
            get(missions::get::<C>)
                .patch(missions::patch::<C>)
                .delete(missions::remove::<C>),
        )
        .route("/api/v1/missions/{id}/sorties", get(missions::sorties::<C>))
        .route("/api/v1/sorties/{id}", patch(missions::patch_sortie::<C>))
        .route(
            "/api/v1/checkpoints",
            post(checkpoints::create::<C>).get(checkpoints::list::<C>),
        )
        .route("/api/v1/checkpoints/prune", post(checkpoints::prune::<C>))
        .route("/api/v1/checkpoints/{id}", get(checkpoints::get::<C>))
        .route(
            "/api/v1/checkpoints/{id}/recover",
            post(checkpoints::recover::<C>),
        )
        .route("/api/v1/specialists/register", post(specialists::register::<C>))
        .route("/api/v1/specialists/reserve", post(specialists::reserve::<C>))
        .route("/api/v1/specialists/progress", post(specialists::progress::<C>))
        .route("/api/v1/specialists/complete", post(specialists::complete::<C>))
        .route("/api/v1/specialists/blocked", post(specialists::blocked::<C>))
        .route("/api/v1/specialists/squawk", post(specialists::squawk::<C>))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(crate::env::request_timeout()))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
