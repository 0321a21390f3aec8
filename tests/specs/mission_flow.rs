// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end mission lifecycle specs.

use crate::helpers::harness;
use axum::http::StatusCode;
use ft_core::resolver::{resolve_dependencies, ResolverNode};
use serde_json::json;

fn auth_sorties() -> serde_json::Value {
    json!([
        {"title": "models", "files": ["/src/models.ts"], "dependencies": []},
        {"title": "handlers", "files": ["/src/handlers.ts"], "dependencies": [0]},
        {"title": "middleware", "files": ["/src/middleware.ts"], "dependencies": [0, 1]},
        {"title": "tests", "files": ["/tests/auth.test.ts"], "dependencies": [0, 1, 2]},
    ])
}

#[tokio::test]
async fn happy_mission_runs_to_completion() {
    let h = harness().await;

    // The resolver sees the chain exactly as specified.
    let nodes: Vec<ResolverNode> = (0..4)
        .map(|i| ResolverNode::new(i.to_string(), (0..i).map(|d| d.to_string()).collect()))
        .collect();
    let plan = resolve_dependencies(&nodes);
    assert_eq!(plan.topological_order, ["0", "1", "2", "3"]);
    assert_eq!(plan.parallel_groups, vec![vec!["0"], vec!["1"], vec!["2"], vec!["3"]]);
    assert_eq!(plan.critical_path, ["0", "1", "2", "3"]);

    let (status, body) = h
        .call(
            "POST",
            "/api/v1/missions/decompose",
            Some(json!({"task": "implement auth", "sorties": auth_sorties()})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let mission_id = body["sortie_tree"]["mission"]["id"].as_str().unwrap().to_string();

    // Complete sorties as their specialists come up, one cohort at a time.
    for step in 0..4 {
        let (_, body) = h
            .call("GET", &format!("/api/v1/missions/{}/sorties", mission_id), None)
            .await;
        let assigned = body["sorties"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["status"] == "assigned")
            .unwrap_or_else(|| panic!("no assigned sortie at step {}", step));
        let specialist = assigned["assigned_to"].as_str().unwrap().to_string();

        let (status, _) = h
            .call(
                "POST",
                "/api/v1/specialists/complete",
                Some(json!({"specialist_id": specialist})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = h.call("GET", &format!("/api/v1/missions/{}", mission_id), None).await;
    assert_eq!(body["mission"]["status"], "completed");
    assert_eq!(body["mission"]["completed_sorties"], 4);

    // A final checkpoint exists.
    let (_, body) = h
        .call("GET", &format!("/api/v1/checkpoints?mission_id={}", mission_id), None)
        .await;
    assert!(body["count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn cycle_rejection_persists_nothing() {
    let h = harness().await;
    let (status, body) = h
        .call(
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
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors[0]["code"], "CIRCULAR_DEPENDENCY");
    assert_eq!(errors[0]["details"]["cycle"], json!([0, 1, 2, 0]));

    let (_, body) = h.call("GET", "/api/v1/missions", None).await;
    assert_eq!(body["total"], 0);
    let (_, body) = h.call("GET", "/api/v1/locks", None).await;
    assert_eq!(body["locks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn blocker_backoff_runs_the_full_schedule() {
    let h = harness().await;
    let (_, body) = h
        .call(
            "POST",
            "/api/v1/missions/decompose",
            Some(json!({"task": "flaky", "sorties": [{"title": "only", "dependencies": []}]})),
        )
        .await;
    let specialist = body["sortie_tree"]["sorties"][0]["assigned_to"]
        .as_str()
        .unwrap()
        .to_string();

    let mut delays = Vec::new();
    for _ in 0..5 {
        let (_, body) = h
            .call(
                "POST",
                "/api/v1/specialists/blocked",
                Some(json!({
                    "specialist_id": specialist,
                    "kind": "api_error",
                    "description": "upstream 500",
                })),
            )
            .await;
        assert_eq!(body["status"], "retrying");
        delays.push(body["retry_after_ms"].as_u64().unwrap());
    }
    assert_eq!(delays, [1000, 2000, 4000, 8000, 16000]);

    let (_, body) = h
        .call(
            "POST",
            "/api/v1/specialists/blocked",
            Some(json!({
                "specialist_id": specialist,
                "kind": "api_error",
                "description": "upstream 500",
            })),
        )
        .await;
    assert_eq!(body["status"], "manual_intervention_required");
    assert!(body["retry_after_ms"].is_null());
}
