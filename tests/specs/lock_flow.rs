// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock conflict queueing and expiry specs.

use crate::helpers::harness;
use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn conflict_queue_promotes_waiter_after_release() {
    let h = harness().await;

    // A reserves the file for 30 seconds.
    let (status, body) = h
        .call(
            "POST",
            "/api/v1/lock/acquire",
            Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-a", "timeout_ms": 30_000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let lock_id = body["lock"]["id"].as_str().unwrap().to_string();

    // B's request queues at position 1.
    let (status, body) = h
        .call(
            "POST",
            "/api/v1/lock/acquire",
            Some(json!({"file": "/src/auth.ts", "specialist_id": "spc-b"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], true);
    assert_eq!(body["position"], 1);

    // A releases two seconds in; one queue tick later, B holds the lock.
    h.clock.advance(Duration::from_secs(2));
    let (status, _) = h
        .call(
            "POST",
            "/api/v1/lock/release",
            Some(json!({"lock_id": lock_id, "specialist_id": "spc-a"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    h.ctx.coordinator.tick_queues().await.unwrap();

    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    let locks = body["locks"].as_array().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["reserved_by"], "spc-b");
}

#[tokio::test]
async fn expiry_sweeper_frees_abandoned_locks() {
    let h = harness().await;

    // A grabs the file for one second and vanishes.
    let (status, _) = h
        .call(
            "POST",
            "/api/v1/lock/acquire",
            Some(json!({"file": "/src/api.ts", "specialist_id": "spc-a", "timeout_ms": 1_000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The sweeper's next pass reaps the lock.
    h.clock.advance(Duration::from_secs(30));
    let expired = h.ctx.coordinator.sweep().await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, ft_core::LockStatus::Expired);

    // B can now acquire directly.
    let (status, body) = h
        .call(
            "POST",
            "/api/v1/lock/acquire",
            Some(json!({"file": "/src/api.ts", "specialist_id": "spc-b"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"]["reserved_by"], "spc-b");
}

#[tokio::test]
async fn active_lock_invariant_holds_under_contention() {
    let h = harness().await;

    for specialist in ["spc-a", "spc-b", "spc-c", "spc-d"] {
        h.call(
            "POST",
            "/api/v1/lock/acquire",
            Some(json!({"file": "/src/shared.ts", "specialist_id": specialist})),
        )
        .await;
    }

    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    let locks = body["locks"].as_array().unwrap();
    assert_eq!(locks.len(), 1, "one active lock per file, ever");
    assert_eq!(locks[0]["reserved_by"], "spc-a");

    let (_, body) = h.call("GET", "/api/v1/coordinator/status", None).await;
    assert_eq!(body["queued_waiters"], 3);
    assert!(body["recent_conflicts"].as_u64().unwrap() >= 3);
}
