// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery specs: stale detection, restore, idempotency.

use crate::helpers::harness;
use axum::http::StatusCode;
use ft_core::Clock;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn crashed_mission_recovers_from_latest_checkpoint() {
    let h = harness().await;

    // Four sorties; 0 and 1 complete, 2 is in flight with a lock held.
    let (_, body) = h
        .call(
            "POST",
            "/api/v1/missions/decompose",
            Some(json!({
                "task": "implement auth",
                "sorties": [
                    {"title": "models", "files": ["/src/models.ts"], "dependencies": []},
                    {"title": "handlers", "files": ["/src/handlers.ts"], "dependencies": [0]},
                    {"title": "middleware", "files": ["/src/middleware.ts"], "dependencies": [1]},
                    {"title": "tests", "files": ["/tests/auth.ts"], "dependencies": [2]},
                ],
            })),
        )
        .await;
    let mission_id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (_, body) = h
            .call("GET", &format!("/api/v1/missions/{}/sorties", mission_id), None)
            .await;
        let assigned = body["sorties"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["status"] == "assigned")
            .unwrap()
            .clone();
        let specialist = assigned["assigned_to"].as_str().unwrap().to_string();
        h.call(
            "POST",
            "/api/v1/specialists/complete",
            Some(json!({"specialist_id": specialist})),
        )
        .await;
    }

    // Sortie 2's specialist reports progress and reserves its file.
    let (_, body) = h
        .call("GET", &format!("/api/v1/missions/{}/sorties", mission_id), None)
        .await;
    let worker = body["sorties"][2]["assigned_to"].as_str().unwrap().to_string();
    h.call(
        "POST",
        "/api/v1/specialists/progress",
        Some(json!({"specialist_id": worker, "progress": 45, "notes": "wiring middleware"})),
    )
    .await;
    h.call(
        "POST",
        "/api/v1/specialists/reserve",
        Some(json!({"specialist_id": worker, "file": "/src/middleware.ts", "timeout_ms": 3_600_000})),
    )
    .await;

    let (status, body) = h
        .call(
            "POST",
            "/api/v1/checkpoints",
            Some(json!({"mission_id": mission_id, "trigger": "manual", "created_by": "spec"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let checkpoint_id = body["checkpoint"]["id"].as_str().unwrap().to_string();

    // "Crash": the lock is torn down and the sortie's progress is lost.
    let worker_id = ft_core::SpecialistId::from_string(worker.as_str());
    h.ctx.store.release_locks_held_by(&worker_id, h.clock.epoch_ms()).await.unwrap();
    let sortie_2 = ft_core::SortieId::parse(&format!("{}.2", mission_id)).unwrap();
    h.ctx
        .store
        .set_sortie_progress(&sortie_2, 0, None, h.clock.epoch_ms())
        .await
        .unwrap();

    // Silence past the activity threshold: the stale scan flags the mission.
    h.clock.advance(Duration::from_secs(360));
    let stale = h.ctx.recovery.scan_stale().await.unwrap();
    assert!(stale.iter().any(|m| m.as_str() == mission_id));

    // Restore.
    let (status, body) = h
        .call(
            "POST",
            &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
            Some(json!({"agent_id": "relaunched-agent"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["restored"]["sorties_restored"], 2);
    assert_eq!(body["restored"]["locks_restored"], 1);
    assert_eq!(body["restored"]["messages_requeued"], 0);

    // The in-flight sortie got its progress and lock back.
    let (_, body) = h
        .call("GET", &format!("/api/v1/missions/{}/sorties", mission_id), None)
        .await;
    assert_eq!(body["sorties"][2]["progress"], 45);
    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    let locks = body["locks"].as_array().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["reserved_by"], worker.as_str());

    // Completed sorties are untouched.
    let (_, body) = h.call("GET", &format!("/api/v1/missions/{}", mission_id), None).await;
    assert_eq!(body["mission"]["completed_sorties"], 2);
}

#[tokio::test]
async fn recovering_twice_is_idempotent() {
    let h = harness().await;
    let (_, body) = h
        .call(
            "POST",
            "/api/v1/missions/decompose",
            Some(json!({"task": "idem", "sorties": [{"title": "only", "dependencies": []}]})),
        )
        .await;
    let mission_id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();

    let (_, body) = h
        .call(
            "POST",
            "/api/v1/checkpoints",
            Some(json!({"mission_id": mission_id, "trigger": "manual", "created_by": "spec"})),
        )
        .await;
    let checkpoint_id = body["checkpoint"]["id"].as_str().unwrap().to_string();

    let (_, first) = h
        .call(
            "POST",
            &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
            Some(json!({"agent_id": "a"})),
        )
        .await;
    h.clock.advance(Duration::from_secs(5));
    let (_, second) = h
        .call(
            "POST",
            &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
            Some(json!({"agent_id": "a"})),
        )
        .await;

    assert_eq!(first["restored"]["sorties_restored"], second["restored"]["sorties_restored"]);
    assert_eq!(second["restored"]["messages_requeued"], 0);

    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    assert_eq!(body["locks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn expired_lock_is_reported_not_reacquired() {
    let h = harness().await;
    let (_, body) = h
        .call(
            "POST",
            "/api/v1/missions/decompose",
            Some(json!({"task": "stale-lock", "sorties": [{"title": "only", "files": ["/src/api.ts"], "dependencies": []}]})),
        )
        .await;
    let mission_id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();
    let worker = body["sortie_tree"]["sorties"][0]["assigned_to"].as_str().unwrap().to_string();

    h.call(
        "POST",
        "/api/v1/specialists/reserve",
        Some(json!({"specialist_id": worker, "file": "/src/api.ts", "timeout_ms": 1_000})),
    )
    .await;
    let (_, body) = h
        .call(
            "POST",
            "/api/v1/checkpoints",
            Some(json!({"mission_id": mission_id, "trigger": "manual", "created_by": "spec"})),
        )
        .await;
    let checkpoint_id = body["checkpoint"]["id"].as_str().unwrap().to_string();

    // The lock dies of old age before anyone recovers.
    h.clock.advance(Duration::from_secs(60));
    h.ctx.coordinator.sweep().await.unwrap();

    let (_, body) = h
        .call(
            "POST",
            &format!("/api/v1/checkpoints/{}/recover", checkpoint_id),
            Some(json!({"agent_id": "a"})),
        )
        .await;
    assert_eq!(body["restored"]["locks_restored"], 0);
    let warnings = body["restored"]["warnings"].as_array().unwrap();
    assert_eq!(warnings[0], "Lock expired: /src/api.ts");
    assert!(body["recovery_context"].as_str().unwrap().contains("Lock expired: /src/api.ts"));

    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    assert_eq!(body["locks"].as_array().unwrap().len(), 0);
}
