// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{seed_mission, test_ctx};
use ft_core::checkpoint::CheckpointTrigger;
use ft_core::lock::LockPurpose;
use ft_core::mission::MissionStatus;
use ft_core::specialist::SpecialistId;
use std::time::Duration;

fn spc(n: &str) -> SpecialistId {
    SpecialistId::from_string(format!("spc-{}", n))
}

#[tokio::test]
async fn scan_ignores_active_missions() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    t.ctx
        .store
        .set_mission_status(&new.mission.id, MissionStatus::InProgress, now)
        .await
        .unwrap();

    // Recent activity: not stale.
    let candidates = t.ctx.recovery.scan_stale().await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn scan_flags_stale_mission_with_checkpoint() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    t.ctx
        .store
        .set_mission_status(&new.mission.id, MissionStatus::InProgress, now)
        .await
        .unwrap();
    t.ctx
        .checkpoints
        .create(&new.mission.id, CheckpointTrigger::Manual, "test")
        .await
        .unwrap();

    // Six minutes of silence, past the five-minute threshold.
    t.clock.advance(Duration::from_secs(360));
    let candidates = t.ctx.recovery.scan_stale().await.unwrap();
    assert_eq!(candidates, vec![new.mission.id.clone()]);

    let latest = t
        .ctx
        .store
        .latest_event(ft_core::event::stream_types::MISSION, new.mission.id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.event_type, "context:compacted");

    // A second scan keeps the candidate without emitting another event.
    let again = t.ctx.recovery.scan_stale().await.unwrap();
    assert_eq!(again, vec![new.mission.id.clone()]);
    let events = t
        .ctx
        .store
        .events_for_stream(ft_core::event::stream_types::MISSION, new.mission.id.as_str(), None)
        .await
        .unwrap();
    let compacted = events.iter().filter(|e| e.event_type == "context:compacted").count();
    assert_eq!(compacted, 1);
}

#[tokio::test]
async fn scan_skips_stale_mission_without_checkpoint() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    t.ctx
        .store
        .set_mission_status(&new.mission.id, MissionStatus::InProgress, now)
        .await
        .unwrap();

    t.clock.advance(Duration::from_secs(360));
    let candidates = t.ctx.recovery.scan_stale().await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn recover_restores_and_renders_prompt() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![], vec![0], vec![1], vec![2]], now).await;
    t.ctx
        .store
        .set_mission_status(&new.mission.id, MissionStatus::InProgress, now)
        .await
        .unwrap();

    // Two sorties done, one in flight with progress and a live lock.
    t.ctx.store.complete_sortie(&new.sorties[0].id, now + 1000).await.unwrap();
    t.ctx.store.complete_sortie(&new.sorties[1].id, now + 2000).await.unwrap();
    let worker = spc("w");
    let specialist = ft_core::Specialist {
        id: worker.clone(),
        name: "worker".to_string(),
        capabilities: vec![],
        status: ft_core::SpecialistStatus::Working,
        last_heartbeat_ms: now + 2000,
        mission_id: Some(new.mission.id.clone()),
        sortie_id: Some(new.sorties[2].id.clone()),
        progress_percent: 30,
        registered_at_ms: now,
    };
    t.ctx.store.insert_specialist(&specialist, true, now + 2000).await.unwrap();
    t.ctx
        .store
        .set_sortie_progress(&new.sorties[2].id, 30, Some("writing handlers"), now + 3000)
        .await
        .unwrap();
    t.ctx
        .coordinator
        .acquire(&worker, "/src/file_2.rs", LockPurpose::Edit, Some(3_600_000))
        .await
        .unwrap();

    let checkpoint = t
        .ctx
        .checkpoints
        .create(&new.mission.id, CheckpointTrigger::Manual, "test")
        .await
        .unwrap();

    // Crash: the lock vanishes, sortie progress is clobbered.
    t.ctx.store.release_locks_held_by(&worker, now + 4000).await.unwrap();
    t.ctx
        .store
        .set_sortie_progress(&new.sorties[2].id, 0, None, now + 5000)
        .await
        .unwrap();

    let outcome = t
        .ctx
        .recovery
        .recover(&checkpoint.id, "agent-1", false)
        .await
        .unwrap();

    assert!(outcome.success);
    assert!(!outcome.dry_run);
    // Snapshots covered the two non-terminal sorties.
    assert_eq!(outcome.report.sorties_restored, 2);
    assert_eq!(outcome.report.locks_restored, 1);
    assert_eq!(outcome.report.messages_requeued, 0);
    assert!(outcome.report.warnings.is_empty());

    let sortie = t.ctx.store.get_sortie(&new.sorties[2].id).await.unwrap().unwrap();
    assert_eq!(sortie.progress, 30);
    assert_eq!(sortie.progress_notes.as_deref(), Some("writing handlers"));

    let lock = t.ctx.store.active_lock_for_file("/src/file_2.rs").await.unwrap().unwrap();
    assert_eq!(lock.reserved_by, worker);

    assert!(outcome.recovery_context.starts_with("## Recovery Context"));
    assert!(outcome.recovery_context.contains("**Mission**:"));

    // fleet:recovered landed on the mission stream.
    let latest = t
        .ctx
        .store
        .latest_event(ft_core::event::stream_types::MISSION, new.mission.id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.event_type, "fleet:recovered");

    // Checkpoint is consumed exactly once.
    let stored = t.ctx.store.get_checkpoint(&checkpoint.id).await.unwrap().unwrap();
    assert!(stored.is_consumed());
}

#[tokio::test]
async fn recover_skips_expired_lock_with_blocker() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    let worker = spc("w");
    let mut specialist = ft_core::test_support::specialist("w");
    specialist.id = worker.clone();
    specialist.mission_id = Some(new.mission.id.clone());
    t.ctx.store.insert_specialist(&specialist, true, now).await.unwrap();

    // Short lock captured in the checkpoint.
    t.ctx
        .coordinator
        .acquire(&worker, "/src/api.rs", LockPurpose::Edit, Some(1_000))
        .await
        .unwrap();
    let checkpoint = t
        .ctx
        .checkpoints
        .create(&new.mission.id, CheckpointTrigger::Manual, "test")
        .await
        .unwrap();
    assert_eq!(checkpoint.active_locks.len(), 1);

    // Well past the lock's expiry; the sweeper has reaped it.
    t.clock.advance(Duration::from_secs(60));
    t.ctx.coordinator.sweep().await.unwrap();
    let outcome = t
        .ctx
        .recovery
        .recover(&checkpoint.id, "agent-1", false)
        .await
        .unwrap();

    assert_eq!(outcome.report.locks_restored, 0);
    assert_eq!(outcome.report.warnings, vec!["Lock expired: /src/api.rs".to_string()]);
    assert!(t.ctx.store.active_lock_for_file("/src/api.rs").await.unwrap().is_none());
    assert!(outcome.recovery_context.contains("Lock expired: /src/api.rs"));
}

#[tokio::test]
async fn dry_run_previews_without_side_effects() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![], vec![0]], now).await;
    let checkpoint = t
        .ctx
        .checkpoints
        .create(&new.mission.id, CheckpointTrigger::Manual, "test")
        .await
        .unwrap();

    let outcome = t
        .ctx
        .recovery
        .recover(&checkpoint.id, "agent-1", true)
        .await
        .unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.report.sorties_restored, 2);

    // Nothing consumed, nothing emitted.
    let stored = t.ctx.store.get_checkpoint(&checkpoint.id).await.unwrap().unwrap();
    assert!(!stored.is_consumed());
    let latest = t
        .ctx
        .store
        .latest_event(ft_core::event::stream_types::MISSION, new.mission.id.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(latest.event_type, "fleet:recovered");
}

#[tokio::test]
async fn recover_unknown_checkpoint_is_not_found() {
    let t = test_ctx().await;
    let err = t
        .ctx
        .recovery
        .recover(&ft_core::CheckpointId::from_string("ckp-ghost"), "agent-1", false)
        .await
        .unwrap_err();
    assert!(matches!(err, RecoveryError::CheckpointNotFound(_)));
}

#[tokio::test]
async fn recover_twice_changes_nothing() {
    let t = test_ctx().await;
    let now = t.clock.epoch_ms();
    let new = seed_mission(&t.ctx.store, &[vec![]], now).await;
    t.ctx
        .store
        .set_sortie_progress(&new.sorties[0].id, 20, Some("early"), now + 100)
        .await
        .unwrap();
    let checkpoint = t
        .ctx
        .checkpoints
        .create(&new.mission.id, CheckpointTrigger::Manual, "test")
        .await
        .unwrap();

    let first = t.ctx.recovery.recover(&checkpoint.id, "agent-1", false).await.unwrap();
    let consumed_at = t
        .ctx
        .store
        .get_checkpoint(&checkpoint.id)
        .await
        .unwrap()
        .unwrap()
        .consumed_at_ms;

    t.clock.advance(Duration::from_secs(10));
    let second = t.ctx.recovery.recover(&checkpoint.id, "agent-1", false).await.unwrap();

    assert_eq!(first.report.sorties_restored, second.report.sorties_restored);
    let sortie = t.ctx.store.get_sortie(&new.sorties[0].id).await.unwrap().unwrap();
    assert_eq!(sortie.progress, 20);

    let still = t
        .ctx
        .store
        .get_checkpoint(&checkpoint.id)
        .await
        .unwrap()
        .unwrap()
        .consumed_at_ms;
    assert_eq!(still, consumed_at);
}
