// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the server test suites.

use crate::dispatch::SpecialistLauncher;
use crate::lifecycle::ServerCtx;
use ft_core::{FakeClock, Sortie};
use ft_storage::{NewMission, Store};
use std::sync::Arc;

pub(crate) struct TestCtx {
    pub ctx: Arc<ServerCtx<FakeClock>>,
    pub clock: FakeClock,
    // NOTE(lifetime): backup files live here until the test ends
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

pub(crate) async fn test_ctx() -> TestCtx {
    let clock = FakeClock::new();
    test_ctx_with(clock, Arc::new(crate::dispatch::LogLauncher)).await
}

pub(crate) async fn test_ctx_with(
    clock: FakeClock,
    launcher: Arc<dyn SpecialistLauncher>,
) -> TestCtx {
    let store = Store::in_memory().await.expect("in-memory store");
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = ServerCtx::build_with_launcher(
        store,
        dir.path().join("checkpoints"),
        clock.clone(),
        launcher,
    );
    TestCtx { ctx, clock, dir }
}

/// Seed a mission with `deps[i]` as the dependency list of sortie `i`.
pub(crate) async fn seed_mission(store: &Store, deps: &[Vec<u32>], now_ms: u64) -> NewMission {
    let mut mission = ft_core::test_support::mission(deps.len() as u32);
    mission.created_at_ms = now_ms;
    mission.updated_at_ms = now_ms;
    let sorties: Vec<Sortie> = deps
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut sortie = ft_core::test_support::sortie(&mission.id, i as u32, d.clone());
            sortie.created_at_ms = now_ms;
            sortie.updated_at_ms = now_ms;
            sortie
        })
        .collect();
    let new = NewMission { mission, sorties };
    store.create_mission(&new, now_ms).await.expect("seed mission");
    new
}
