// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support;

#[test]
fn fresh_checkpoint_is_unconsumed() {
    let mission = test_support::mission(4);
    let ckpt = test_support::checkpoint(&mission.id, 1_000_000);
    assert!(!ckpt.is_consumed());
    assert_eq!(ckpt.version, CHECKPOINT_VERSION);
}

#[test]
fn checkpoint_survives_serde() {
    let mission = test_support::mission(2);
    let mut ckpt = test_support::checkpoint(&mission.id, 1_000_000);
    ckpt.sorties.push(SortieSnapshot {
        id: crate::sortie::SortieId::new(mission.id.clone(), 0),
        status: crate::sortie::SortieStatus::InProgress,
        assigned_to: None,
        files: vec!["/src/auth.rs".to_string()],
        progress: 40,
        progress_notes: Some("halfway through handlers".to_string()),
        started_at_ms: Some(999_000),
        updated_at_ms: 1_000_000,
    });

    let json = serde_json::to_string(&ckpt).unwrap();
    let back: Checkpoint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ckpt);
}

#[test]
fn prompt_carries_stable_headings() {
    let ctx = RecoveryContext {
        last_action: "completed sortie 1".to_string(),
        next_steps: vec!["finish sortie 2".to_string(), "start sortie 3".to_string()],
        blockers: vec!["Lock expired: /src/api.rs".to_string()],
        files_modified: vec!["/src/auth.rs".to_string()],
        mission_summary: "implement auth (2/4 sorties done)".to_string(),
        elapsed_time_ms: 125_000,
        last_activity_at_ms: 1_000_000,
    };
    let prompt = ctx.to_prompt();

    assert!(prompt.starts_with("## Recovery Context\n"));
    assert!(prompt.contains("**Mission**: implement auth (2/4 sorties done)"));
    assert!(prompt.contains("### Next Steps\n- finish sortie 2\n- start sortie 3"));
    assert!(prompt.contains("### Blockers\n- Lock expired: /src/api.rs"));
    assert!(prompt.contains("### Files Modified\n- /src/auth.rs"));
    assert!(prompt.contains("Elapsed: 2m 5s"));
}

#[test]
fn prompt_omits_empty_sections() {
    let ctx = RecoveryContext {
        last_action: "started".to_string(),
        mission_summary: "quiet mission".to_string(),
        ..RecoveryContext::default()
    };
    let prompt = ctx.to_prompt();

    assert!(!prompt.contains("### Next Steps"));
    assert!(!prompt.contains("### Blockers"));
    assert!(!prompt.contains("### Files Modified"));
}

#[yare::parameterized(
    progress = { CheckpointTrigger::Progress, "progress" },
    error    = { CheckpointTrigger::Error,    "error" },
    manual   = { CheckpointTrigger::Manual,   "manual" },
)]
fn trigger_roundtrips(trigger: CheckpointTrigger, wire: &str) {
    assert_eq!(trigger.to_string(), wire);
    let json = serde_json::to_string(&trigger).unwrap();
    assert_eq!(json, format!("\"{}\"", wire));
}
