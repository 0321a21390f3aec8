// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::mission::MissionId;

fn report(kind: BlockerKind) -> BlockerReport {
    BlockerReport {
        kind,
        description: "something went wrong".to_string(),
        affected_sortie: None,
        file: None,
    }
}

#[test]
fn backoff_schedule_doubles_until_cap() {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.delay_ms(0), 1000);
    assert_eq!(policy.delay_ms(1), 2000);
    assert_eq!(policy.delay_ms(2), 4000);
    assert_eq!(policy.delay_ms(3), 8000);
    assert_eq!(policy.delay_ms(4), 16000);
    // Caps at max_delay_ms regardless of count
    assert_eq!(policy.delay_ms(10), 60_000);
}

#[test]
fn api_error_retries_through_full_schedule() {
    let policy = BackoffPolicy::default();
    let mut delays = Vec::new();
    for retry in 0..5 {
        let res = resolve(&report(BlockerKind::ApiError), retry, &policy, None);
        assert_eq!(res.status, ResolutionStatus::Retrying);
        assert_eq!(res.next_action, Some(NextAction::RetryAfterBackoff));
        delays.push(res.retry_after_ms.unwrap());
    }
    assert_eq!(delays, [1000, 2000, 4000, 8000, 16000]);
}

#[test]
fn sixth_attempt_escalates() {
    let policy = BackoffPolicy::default();
    let res = resolve(&report(BlockerKind::ApiError), 5, &policy, None);
    assert_eq!(res.status, ResolutionStatus::ManualInterventionRequired);
    assert_eq!(res.retry_after_ms, None);
    assert_eq!(res.next_action, Some(NextAction::EscalateToOperator));
}

#[yare::parameterized(
    lock_timeout = { BlockerKind::LockTimeout },
    api_error    = { BlockerKind::ApiError },
)]
fn retryable_kinds_share_the_schedule(kind: BlockerKind) {
    let policy = BackoffPolicy::default();
    let res = resolve(&report(kind), 2, &policy, None);
    assert_eq!(res.status, ResolutionStatus::Retrying);
    assert_eq!(res.retry_after_ms, Some(4000));
}

#[test]
fn completed_dependency_resolves() {
    let policy = BackoffPolicy::default();
    let res = resolve(
        &report(BlockerKind::Dependency),
        0,
        &policy,
        Some(DependencyState::Completed),
    );
    assert_eq!(res.status, ResolutionStatus::Resolved);
    assert_eq!(res.next_action, Some(NextAction::ResumeWork));
}

#[test]
fn pending_dependency_waits() {
    let policy = BackoffPolicy::default();
    let mission = MissionId::from_string("msn-test");
    let mut rep = report(BlockerKind::Dependency);
    rep.affected_sortie = Some(crate::sortie::SortieId::new(mission, 2));

    let res = resolve(&rep, 0, &policy, Some(DependencyState::Pending));
    assert_eq!(res.status, ResolutionStatus::Waiting);
    assert_eq!(res.next_action, Some(NextAction::WaitForDependency));
    assert!(res.resolution_hint.contains("msn-test.2"));
}

#[test]
fn missing_dependency_needs_a_human() {
    let policy = BackoffPolicy::default();
    let res = resolve(
        &report(BlockerKind::Dependency),
        0,
        &policy,
        Some(DependencyState::Missing),
    );
    assert_eq!(res.status, ResolutionStatus::ManualInterventionRequired);
}

#[test]
fn other_preserves_the_description() {
    let policy = BackoffPolicy::default();
    let res = resolve(&report(BlockerKind::Other), 0, &policy, None);
    assert_eq!(res.status, ResolutionStatus::ManualInterventionRequired);
    assert_eq!(res.resolution_hint, "something went wrong");
}

#[yare::parameterized(
    lock_timeout = { BlockerKind::LockTimeout, "lock_timeout" },
    api_error    = { BlockerKind::ApiError, "api_error" },
    dependency   = { BlockerKind::Dependency, "dependency" },
    other        = { BlockerKind::Other, "other" },
)]
fn kind_serializes_as_snake_case(kind: BlockerKind, expected: &str) {
    let json = serde_json::to_string(&kind).unwrap();
    assert_eq!(json, format!("\"{}\"", expected));
    assert_eq!(kind.to_string(), expected);
}
