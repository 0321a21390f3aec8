// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{seed_mission, test_ctx, TestCtx};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(
    t: &TestCtx,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let router = router(t.ctx.clone());
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder().method(method).uri(uri).body(Body::empty()).unwrap(),
    };
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let t = test_ctx().await;
    let (status, body) = call(&t, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "fleetd");
    assert!(body["timestamp"].is_number());
}

#[tokio::test]
async fn mailbox_append_then_read() {
    let t = test_ctx().await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/mailbox/append",
        Some(json!({
            "stream_id": "squawk:alpha",
            "events": [
                {"type": "scout:report", "data": {"found": 3}},
                {"type": "scout:report", "data": {"found": 1}},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);
    assert_eq!(body["mailbox"]["id"], "squawk:alpha");
    assert_eq!(body["mailbox"]["events"].as_array().unwrap().len(), 2);

    let (status, body) = call(&t, "GET", "/api/v1/mailbox/squawk:alpha", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["mailbox"]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["sequence_number"], 1);
    assert_eq!(events[1]["sequence_number"], 2);
    assert_eq!(events[0]["event_type"], "scout:report");
}

#[tokio::test]
async fn mailbox_read_unknown_is_404() {
    let t = test_ctx().await;
    let (status, body) = call(&t, "GET", "/api/v1/mailbox/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn mailbox_append_rejects_empty_events() {
    let t = test_ctx().await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/mailbox/append",
        Some(json!({"stream_id": "squawk:alpha", "events": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn cursor_advance_and_get() {
    let t = test_ctx().await;
    call(
        &t,
        "POST",
        "/api/v1/mailbox/append",
        Some(json!({
            "stream_id": "squawk:alpha",
            "events": [{"type": "a:b", "data": {}}],
        })),
    )
    .await;

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/cursor/advance",
        Some(json!({"stream_id": "squawk:alpha", "position": 1, "consumer_id": "reader"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cursor_id = body["cursor"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["cursor"]["position"], 1);

    let (status, body) = call(&t, "GET", &format!("/api/v1/cursor/{}", cursor_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cursor"]["consumer_id"], "reader");

    let (status, _) = call(
        &t,
        "POST",
        "/api/v1/cursor/advance",
        Some(json!({"stream_id": "missing", "position": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lock_lifecycle_over_http() {
    let t = test_ctx().await;

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/lock/acquire",
        Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-a", "timeout_ms": 30000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lock_id = body["lock"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["lock"]["file"], "/src/auth.ts");

    // Conflicting request queues at position 1.
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/lock/acquire",
        Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conflict"], true);
    assert_eq!(body["queued"], true);
    assert_eq!(body["position"], 1);
    assert_eq!(body["existing_lock"]["reserved_by"], "spc-a");

    // Wrong owner cannot release.
    let (status, _) = call(
        &t,
        "POST",
        "/api/v1/lock/release",
        Some(json!({"lock_id": lock_id, "specialist_id": "spc-b"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner releases; the queued waiter gets the lock immediately.
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/lock/release",
        Some(json!({"lock_id": lock_id, "specialist_id": "spc-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], true);

    let (status, body) = call(&t, "GET", "/api/v1/locks", None).await;
    assert_eq!(status, StatusCode::OK);
    let locks = body["locks"].as_array().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["reserved_by"], "spc-b");
}

#[tokio::test]
async fn lock_release_unknown_is_404() {
    let t = test_ctx().await;
    let (status, _) = call(
        &t,
        "POST",
        "/api/v1/lock/release",
        Some(json!({"lock_id": "lck-ghost", "specialist_id": "spc-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_reacquire_is_409() {
    let t = test_ctx().await;
    call(
        &t,
        "POST",
        "/api/v1/lock/acquire",
        Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-a"})),
    )
    .await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/lock/acquire",
        Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-a"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SELF_CONFLICT");
    assert_eq!(body["existing_lock"]["reserved_by"], "spc-a");
}

fn sortie_drafts() -> Value {
    json!([
        {"title": "models", "files": ["/src/models.rs"], "dependencies": []},
        {"title": "handlers", "files": ["/src/handlers.rs"], "dependencies": [0]},
        {"title": "wiring", "files": ["/src/main.rs"], "dependencies": [0, 1]},
        {"title": "tests", "files": ["/tests/auth.rs"], "dependencies": [0, 1, 2]},
    ])
}

#[tokio::test]
async fn decompose_creates_mission_and_starts_dispatch() {
    let t = test_ctx().await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({"task": "implement auth", "sorties": sortie_drafts()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let mission = &body["sortie_tree"]["mission"];
    assert_eq!(mission["status"], "in_progress");
    assert_eq!(mission["total_sorties"], 4);

    let sorties = body["sortie_tree"]["sorties"].as_array().unwrap();
    assert_eq!(sorties.len(), 4);
    // The first cohort is already assigned.
    assert_eq!(sorties[0]["status"], "assigned");
    assert_eq!(sorties[1]["status"], "pending");
}

#[tokio::test]
async fn decompose_rejects_cycles_without_persisting() {
    let t = test_ctx().await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({
            "task": "cyclic",
            "sorties": [
                {"title": "a", "dependencies": [1]},
                {"title": "b", "dependencies": [2]},
                {"title": "c", "dependencies": [0]},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "CIRCULAR_DEPENDENCY");
    assert_eq!(errors[0]["details"]["cycle"], json!([0, 1, 2, 0]));

    let (_, body) = call(&t, "GET", "/api/v1/missions", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn decompose_rejects_file_overlap() {
    let t = test_ctx().await;
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({
            "task": "overlapping",
            "sorties": [
                {"title": "a", "files": ["/src/auth.rs"], "dependencies": []},
                {"title": "b", "files": ["/src/auth.rs"], "dependencies": [0]},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors[0]["code"], "FILE_OVERLAP");
}

#[tokio::test]
async fn mission_listing_pages_and_detail() {
    let t = test_ctx().await;
    call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({"task": "one", "sorties": [{"title": "only", "dependencies": []}]})),
    )
    .await;

    let (status, body) = call(&t, "GET", "/api/v1/missions?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let id = body["missions"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&t, "GET", &format!("/api/v1/missions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"]["id"], id.as_str());

    let (status, _) = call(&t, "GET", "/api/v1/missions/msn-ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&t, "GET", "/api/v1/missions?status=completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn sorties_listing_includes_cohorts() {
    let t = test_ctx().await;
    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({
            "task": "diamond",
            "sorties": [
                {"title": "root", "dependencies": []},
                {"title": "left", "dependencies": [0]},
                {"title": "right", "dependencies": [0]},
                {"title": "join", "dependencies": [1, 2]},
            ],
        })),
    )
    .await;
    let id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        call(&t, "GET", &format!("/api/v1/missions/{}/sorties", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sorties"].as_array().unwrap().len(), 4);
    // Root is assigned (dispatched), so nothing is currently parallelizable
    // and the dependents wait.
    assert_eq!(body["parallelizable"], json!([]));
    assert_eq!(body["blocked"], json!([1, 2, 3]));
}

#[tokio::test]
async fn patch_sortie_updates_status() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    let sortie_id = new.sorties[0].id.to_string();

    let (status, body) = call(
        &t,
        "PATCH",
        &format!("/api/v1/sorties/{}", sortie_id),
        Some(json!({"status": "in_progress", "assigned_to": "spc-z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sortie"]["status"], "in_progress");
    assert_eq!(body["sortie"]["assigned_to"], "spc-z");
}

#[tokio::test]
async fn delete_mission_cascades_over_http() {
    let t = test_ctx().await;
    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({"task": "short-lived", "sorties": [{"title": "x", "dependencies": []}]})),
    )
    .await;
    let id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&t, "DELETE", &format!("/api/v1/missions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&t, "GET", &format!("/api/v1/missions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkpoint_create_get_recover() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![], vec![0]], now).await;

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/checkpoints",
        Some(json!({"mission_id": new.mission.id.as_str(), "trigger": "manual", "created_by": "operator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let checkpoint_id = body["checkpoint"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["checkpoint"]["created_by"], "operator");

    let (status, body) =
        call(&t, "GET", &format!("/api/v1/checkpoints/{}", checkpoint_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checkpoint"]["mission_id"], new.mission.id.as_str());

    let (status, body) = call(
        &t,
        "GET",
        &format!("/api/v1/checkpoints?mission_id={}", new.mission.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    // Dry run first, then the real thing.
    let (status, body) = call(
        &t,
        "POST",
        &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
        Some(json!({"agent_id": "agent-1", "dry_run": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["would_restore"]["sorties_restored"], 2);

    let (status, body) = call(
        &t,
        "POST",
        &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
        Some(json!({"agent_id": "agent-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["recovery_context"]
        .as_str()
        .unwrap()
        .starts_with("## Recovery Context"));
    assert_eq!(body["restored"]["sorties_restored"], 2);
}

#[tokio::test]
async fn checkpoint_prune_endpoint_reports_deletions() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    for _ in 0..5 {
        t.clock.advance(std::time::Duration::from_secs(1));
        t.ctx
            .checkpoints
            .create(&new.mission.id, ft_core::CheckpointTrigger::Manual, "test")
            .await
            .unwrap();
    }
    t.clock.advance(std::time::Duration::from_secs(30 * 86_400));

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/checkpoints/prune",
        Some(json!({"older_than_days": 7, "keep_per_mission": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);
}

#[tokio::test]
async fn specialist_tool_flow() {
    let t = test_ctx().await;
    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({"task": "tooling", "sorties": [{"title": "only", "files": ["/src/lib.rs"], "dependencies": []}]})),
    )
    .await;
    let mission_id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();
    let specialist_id =
        body["sortie_tree"]["sorties"][0]["assigned_to"].as_str().unwrap().to_string();

    // The spawned runner announces readiness.
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/register",
        Some(json!({"specialist_id": specialist_id, "name": "auth-worker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "registered");
    assert_eq!(body["sortie_id"], format!("{}.0", mission_id));

    // Reserve the file it will edit.
    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/reserve",
        Some(json!({"specialist_id": specialist_id, "file": "/src/lib.rs"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reserved");

    // Progress, then completion.
    let (status, _) = call(
        &t,
        "POST",
        "/api/v1/specialists/progress",
        Some(json!({"specialist_id": specialist_id, "progress": 60, "notes": "nearly there"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/complete",
        Some(json!({"specialist_id": specialist_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["mission_status"], "completed");
    assert_eq!(body["completed_sorties"], 1);

    // Completion released the reservation.
    let (_, body) = call(&t, "GET", "/api/v1/locks", None).await;
    assert_eq!(body["locks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn blocked_tool_returns_backoff_schedule() {
    let t = test_ctx().await;
    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/missions/decompose",
        Some(json!({"task": "flaky", "sorties": [{"title": "only", "dependencies": []}]})),
    )
    .await;
    let specialist_id =
        body["sortie_tree"]["sorties"][0]["assigned_to"].as_str().unwrap().to_string();

    let mut delays = Vec::new();
    for _ in 0..5 {
        let (status, body) = call(
            &t,
            "POST",
            "/api/v1/specialists/blocked",
            Some(json!({"specialist_id": specialist_id, "kind": "api_error", "description": "rate limited"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "retrying");
        delays.push(body["retry_after_ms"].as_u64().unwrap());
    }
    assert_eq!(delays, [1000, 2000, 4000, 8000, 16000]);

    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/blocked",
        Some(json!({"specialist_id": specialist_id, "kind": "api_error", "description": "rate limited"})),
    )
    .await;
    assert_eq!(body["status"], "manual_intervention_required");
}

#[tokio::test]
async fn squawk_delivers_between_specialists() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    for name in ["sender", "receiver"] {
        let mut specialist = ft_core::test_support::specialist(name);
        specialist.id = ft_core::SpecialistId::from_string(format!("spc-{}", name));
        t.ctx.store.insert_specialist(&specialist, false, now).await.unwrap();
    }

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/squawk",
        Some(json!({
            "specialist_id": "spc-sender",
            "to": ["spc-receiver"],
            "subject": "handoff",
            "payload": {"files": ["/src/auth.rs"]},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sent"].is_string());
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/squawk",
        Some(json!({"specialist_id": "spc-receiver"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let inbox = body["messages"].as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["subject"], "handoff");

    // Drained: a second poll is empty.
    let (_, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/squawk",
        Some(json!({"specialist_id": "spc-receiver"})),
    )
    .await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reregistration_returns_recovery_context() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    let mut specialist = ft_core::test_support::specialist("worker");
    specialist.mission_id = Some(new.mission.id.clone());
    specialist.sortie_id = Some(new.sorties[0].id.clone());
    t.ctx.store.insert_specialist(&specialist, true, now).await.unwrap();
    t.ctx
        .checkpoints
        .create(&new.mission.id, ft_core::CheckpointTrigger::Manual, "test")
        .await
        .unwrap();

    let (status, body) = call(
        &t,
        "POST",
        "/api/v1/specialists/register",
        Some(json!({"specialist_id": specialist.id.as_str(), "name": "worker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["recovery_context"]
        .as_str()
        .unwrap()
        .starts_with("## Recovery Context"));
    assert!(body["checkpoint_id"].is_string());
}

#[tokio::test]
async fn coordinator_status_counts() {
    let t = test_ctx().await;
    call(
        &t,
        "POST",
        "/api/v1/mailbox/append",
        Some(json!({"stream_id": "squawk:a", "events": [{"type": "x:y", "data": {}}]})),
    )
    .await;
    call(
        &t,
        "POST",
        "/api/v1/lock/acquire",
        Some(json!({"file": "/src/a.rs", "specialist_id": "spc-a"})),
    )
    .await;

    let (status, body) = call(&t, "GET", "/api/v1/coordinator/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_mailboxes"], 1);
    assert_eq!(body["active_locks"], 1);
    assert_eq!(body["queued_waiters"], 0);
}
