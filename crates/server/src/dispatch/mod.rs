// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch orchestrator: owns a mission's execution lifecycle.
//!
//! One [`Dispatcher`] per mission, held by the server-owned
//! [`DispatchRegistry`]. Dispatchers track specialist *ids* only - full
//! records live in the store, so there is no shared mutable graph between
//! the orchestrator and the API handlers.

mod launcher;

pub use launcher::{LaunchError, LogLauncher, SpecialistLauncher};

use crate::checkpoint::CheckpointService;
use crate::coordinator::LockCoordinator;
use ft_core::blocker::{
    self, BackoffPolicy, BlockerKind, BlockerReport, BlockerResolution, DependencyState,
    ResolutionStatus,
};
use ft_core::event::{stream_types, EventPayload, NewEvent};
use ft_core::mission::{Mission, MissionId, MissionStatus};
use ft_core::resolver::{resolve_dependencies, ResolverNode};
use ft_core::sortie::{Sortie, SortieStatus};
use ft_core::specialist::{Specialist, SpecialistId, SpecialistStatus};
use ft_core::{CheckpointTrigger, Clock};
use ft_storage::{StorageError, Store};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Default heartbeat timeout before a specialist is failed.
pub const HEARTBEAT_TIMEOUT_MS: u64 = 300_000;

/// Default interval between periodic progress checkpoints.
pub const CHECKPOINT_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("mission not found: {0}")]
    MissionNotFound(String),

    #[error("specialist not found: {0}")]
    SpecialistNotFound(String),

    #[error("mission {0} is {1}, cannot {2}")]
    InvalidPhase(String, DispatchPhase, &'static str),
}

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

ft_core::simple_display! {
    DispatchPhase {
        Idle => "idle",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Tunables for the monitor loop.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub heartbeat_timeout_ms: u64,
    pub checkpoint_interval_ms: u64,
    pub backoff: BackoffPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: HEARTBEAT_TIMEOUT_MS,
            checkpoint_interval_ms: CHECKPOINT_INTERVAL_MS,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Mutable orchestrator state, kept small and lock-scoped.
struct DispatchState {
    phase: DispatchPhase,
    specialists: HashSet<SpecialistId>,
    retries: HashMap<(SpecialistId, BlockerKind), u32>,
    last_checkpoint_ms: u64,
    last_quartile: u8,
}

/// Owns one mission's execution.
pub struct Dispatcher<C: Clock> {
    mission_id: MissionId,
    store: Store,
    coordinator: Arc<LockCoordinator<C>>,
    checkpoints: Arc<CheckpointService<C>>,
    launcher: Arc<dyn SpecialistLauncher>,
    clock: C,
    config: DispatchConfig,
    state: Mutex<DispatchState>,
}

impl<C: Clock> Dispatcher<C> {
    fn new(mission_id: MissionId, deps: &DispatchDeps<C>) -> Self {
        Self {
            mission_id,
            store: deps.store.clone(),
            coordinator: deps.coordinator.clone(),
            checkpoints: deps.checkpoints.clone(),
            launcher: deps.launcher.clone(),
            clock: deps.clock.clone(),
            config: deps.config,
            state: Mutex::new(DispatchState {
                phase: DispatchPhase::Idle,
                specialists: HashSet::new(),
                retries: HashMap::new(),
                last_checkpoint_ms: 0,
                last_quartile: 0,
            }),
        }
    }

    pub fn mission_id(&self) -> &MissionId {
        &self.mission_id
    }

    pub fn phase(&self) -> DispatchPhase {
        self.state.lock().phase
    }

    /// Ids of specialists this dispatcher is tracking.
    pub fn tracked_specialists(&self) -> Vec<SpecialistId> {
        self.state.lock().specialists.iter().cloned().collect()
    }

    /// Start executing the mission: mark it in progress and spawn a
    /// specialist for every dependency-free sortie.
    pub async fn initialize(&self) -> Result<(), DispatchError> {
        {
            let mut state = self.state.lock();
            match state.phase {
                DispatchPhase::Idle => state.phase = DispatchPhase::Running,
                other => {
                    return Err(DispatchError::InvalidPhase(
                        self.mission_id.to_string(),
                        other,
                        "initialize",
                    ))
                }
            }
        }

        let mission = self.require_mission().await?;
        if mission.status == MissionStatus::Pending {
            self.store
                .set_mission_status(&self.mission_id, MissionStatus::InProgress, self.now())
                .await?;
        }

        let sorties = self.store.sorties_for_mission(&self.mission_id, None).await?;
        self.coordinate_locks(&sorties);
        self.spawn_ready(&sorties).await?;

        {
            let mut state = self.state.lock();
            state.last_checkpoint_ms = self.clock.epoch_ms();
        }
        tracing::info!(mission = %self.mission_id, "dispatch initialized");
        Ok(())
    }

    /// Defensive cross-check of file overlap between sorties that may run
    /// concurrently. Decompose validation already guarantees zero overlap;
    /// a hit here means corrupted state and is logged, not fatal.
    fn coordinate_locks(&self, sorties: &[Sortie]) {
        let mut seen: HashMap<&str, &Sortie> = HashMap::new();
        for sortie in sorties.iter().filter(|s| !s.is_terminal()) {
            for file in &sortie.files {
                if sortie.new_files.contains(file) {
                    continue;
                }
                if let Some(other) = seen.insert(file.as_str(), sortie) {
                    if other.id != sortie.id {
                        tracing::warn!(
                            mission = %self.mission_id,
                            file = %file,
                            first = %other.id,
                            second = %sortie.id,
                            "file overlap between sorties"
                        );
                    }
                }
            }
        }
    }

    /// Spawn specialists for every pending sortie whose dependencies are
    /// complete. Called at initialization and after each completion.
    async fn spawn_ready(&self, sorties: &[Sortie]) -> Result<(), DispatchError> {
        let completed: Vec<u32> = sorties
            .iter()
            .filter(|s| s.status == SortieStatus::Completed)
            .map(|s| s.sortie_index)
            .collect();

        for sortie in sorties.iter().filter(|s| s.is_ready(&completed)) {
            let now = self.now();
            let specialist = Specialist {
                id: SpecialistId::new(),
                name: format!("specialist-{}", sortie.id.index()),
                capabilities: vec![],
                status: SpecialistStatus::Spawned,
                last_heartbeat_ms: now,
                mission_id: Some(self.mission_id.clone()),
                sortie_id: Some(sortie.id.clone()),
                progress_percent: 0,
                registered_at_ms: now,
            };
            self.store.insert_specialist(&specialist, true, now).await?;
            self.store
                .set_sortie_status(&sortie.id, SortieStatus::Assigned, Some(&specialist.id), now)
                .await?;
            self.state.lock().specialists.insert(specialist.id.clone());

            if let Err(e) = self.launcher.launch(&specialist, sortie).await {
                tracing::warn!(
                    specialist = %specialist.id,
                    sortie = %sortie.id,
                    error = %e,
                    "launch failed, awaiting heartbeat timeout"
                );
            }
        }
        Ok(())
    }

    /// One monitor pass: fail heartbeat-stale specialists and write the
    /// periodic progress checkpoint.
    pub async fn monitor_tick(&self) -> Result<(), DispatchError> {
        if self.phase() != DispatchPhase::Running {
            return Ok(());
        }
        let now = self.now();

        let specialists = self.store.specialists_for_mission(&self.mission_id).await?;
        for specialist in &specialists {
            if !specialist.status.is_terminal()
                && specialist.heartbeat_stale(now, self.config.heartbeat_timeout_ms)
            {
                tracing::warn!(
                    specialist = %specialist.id,
                    idle_ms = now.saturating_sub(specialist.last_heartbeat_ms),
                    "heartbeat timeout"
                );
                self.fail_specialist(&specialist.id, "heartbeat timeout").await?;
            }
        }

        let due = {
            let state = self.state.lock();
            state.phase == DispatchPhase::Running
                && now.saturating_sub(state.last_checkpoint_ms) >= self.config.checkpoint_interval_ms
        };
        if due {
            self.create_checkpoint(CheckpointTrigger::Progress).await;
        }
        Ok(())
    }

    /// A specialist's progress report (heartbeat included).
    pub async fn on_progress(
        &self,
        specialist_id: &SpecialistId,
        progress: u8,
        notes: Option<&str>,
    ) -> Result<(), DispatchError> {
        let now = self.now();
        let specialist = self.require_specialist(specialist_id).await?;
        self.store.touch_specialist(specialist_id, now).await?;
        self.store.set_specialist_progress(specialist_id, progress).await?;
        if let Some(sortie_id) = &specialist.sortie_id {
            self.store.set_sortie_progress(sortie_id, progress, notes, now).await?;
        }
        Ok(())
    }

    /// A specialist reports its sortie complete: roll the mission forward,
    /// release its locks, and spawn whatever the completion unblocked.
    pub async fn on_complete(&self, specialist_id: &SpecialistId) -> Result<Mission, DispatchError> {
        let now = self.now();
        let specialist = self.require_specialist(specialist_id).await?;
        let sortie_id = specialist
            .sortie_id
            .clone()
            .ok_or_else(|| DispatchError::SpecialistNotFound(specialist_id.to_string()))?;

        let (_, mission) = self.store.complete_sortie(&sortie_id, now).await?;
        self.store
            .set_specialist_status(specialist_id, SpecialistStatus::Completed)
            .await?;
        self.coordinator.release_all_for(specialist_id).await?;
        self.store.remove_specialist(specialist_id).await?;
        self.state.lock().specialists.remove(specialist_id);

        if mission.status == MissionStatus::Completed {
            {
                let mut state = self.state.lock();
                state.phase = DispatchPhase::Completed;
            }
            tracing::info!(mission = %self.mission_id, "mission completed");
            self.create_checkpoint(CheckpointTrigger::Progress).await;
            return Ok(mission);
        }

        // Quartile crossings force an immediate checkpoint between the
        // interval timer's ticks.
        let quartile = (mission.progress_percent() / 25.0) as u8 * 25;
        let crossed = {
            let mut state = self.state.lock();
            if quartile > state.last_quartile {
                state.last_quartile = quartile;
                true
            } else {
                false
            }
        };
        if crossed {
            self.create_checkpoint(CheckpointTrigger::Progress).await;
        }

        let sorties = self.store.sorties_for_mission(&self.mission_id, None).await?;
        self.spawn_ready(&sorties).await?;
        Ok(mission)
    }

    /// A specialist reports a blocker: classify, decide, record, act.
    pub async fn on_blocker(
        &self,
        specialist_id: &SpecialistId,
        report: &BlockerReport,
    ) -> Result<BlockerResolution, DispatchError> {
        let now = self.now();
        let specialist = self.require_specialist(specialist_id).await?;
        self.store.touch_specialist(specialist_id, now).await?;

        let dependency = match (&report.kind, &report.affected_sortie) {
            (BlockerKind::Dependency, Some(sortie_id)) => {
                match self.store.get_sortie(sortie_id).await? {
                    Some(s) if s.status == SortieStatus::Completed => {
                        Some(DependencyState::Completed)
                    }
                    Some(_) => Some(DependencyState::Pending),
                    None => Some(DependencyState::Missing),
                }
            }
            (BlockerKind::Dependency, None) => Some(DependencyState::Missing),
            _ => None,
        };

        let retry_count = {
            let state = self.state.lock();
            state
                .retries
                .get(&(specialist_id.clone(), report.kind))
                .copied()
                .unwrap_or(0)
        };

        let resolution = blocker::resolve(report, retry_count, &self.config.backoff, dependency);

        if resolution.status == ResolutionStatus::Retrying {
            let mut state = self.state.lock();
            *state
                .retries
                .entry((specialist_id.clone(), report.kind))
                .or_insert(0) += 1;
        }

        let payload = EventPayload::SpecialistBlockerHandled {
            id: specialist_id.clone(),
            kind: report.kind,
            retry_count,
            delay_ms: resolution.retry_after_ms,
            target_sortie: report.affected_sortie.clone(),
        };
        self.store
            .append_event(
                stream_types::SPECIALIST,
                specialist_id.as_str(),
                &payload,
                NewEvent::default(),
                now,
            )
            .await?;

        match resolution.status {
            ResolutionStatus::Resolved => {
                self.store
                    .set_specialist_status(specialist_id, SpecialistStatus::Working)
                    .await?;
            }
            ResolutionStatus::Retrying | ResolutionStatus::Waiting => {
                self.store
                    .set_specialist_status(specialist_id, SpecialistStatus::Blocked)
                    .await?;
                if let Some(sortie_id) = &specialist.sortie_id {
                    if resolution.status == ResolutionStatus::Waiting {
                        self.store
                            .set_sortie_status(sortie_id, SortieStatus::Blocked, None, now)
                            .await?;
                    }
                }
            }
            ResolutionStatus::ManualInterventionRequired => {
                self.store
                    .set_specialist_status(specialist_id, SpecialistStatus::Blocked)
                    .await?;
                if let Some(sortie_id) = &specialist.sortie_id {
                    self.store
                        .set_sortie_status(sortie_id, SortieStatus::Blocked, None, now)
                        .await?;
                }
                self.store
                    .set_mission_status(&self.mission_id, MissionStatus::Blocked, now)
                    .await?;
                self.create_checkpoint(CheckpointTrigger::Error).await;
            }
        }

        tracing::info!(
            specialist = %specialist_id,
            kind = %report.kind,
            status = %resolution.status,
            retry_count,
            "blocker handled"
        );
        Ok(resolution)
    }

    /// Fail a specialist (heartbeat timeout, launch failure). The sortie is
    /// failed; the mission only fails with it when the sortie sits on the
    /// critical path.
    pub async fn fail_specialist(
        &self,
        specialist_id: &SpecialistId,
        reason: &str,
    ) -> Result<(), DispatchError> {
        let now = self.now();
        let specialist = self.require_specialist(specialist_id).await?;
        self.store
            .set_specialist_status(specialist_id, SpecialistStatus::Failed)
            .await?;
        self.coordinator.release_all_for(specialist_id).await?;
        self.state.lock().specialists.remove(specialist_id);

        let Some(sortie_id) = specialist.sortie_id.clone() else {
            return Ok(());
        };
        self.store
            .set_sortie_status(&sortie_id, SortieStatus::Failed, None, now)
            .await?;
        tracing::warn!(sortie = %sortie_id, reason, "sortie failed");

        let sorties = self.store.sorties_for_mission(&self.mission_id, None).await?;
        if self.on_critical_path(&sorties, &sortie_id.to_string()) {
            {
                let mut state = self.state.lock();
                state.phase = DispatchPhase::Failed;
            }
            self.store
                .set_mission_status(&self.mission_id, MissionStatus::Blocked, now)
                .await?;
            self.create_checkpoint(CheckpointTrigger::Error).await;
            tracing::error!(
                mission = %self.mission_id,
                sortie = %sortie_id,
                "critical-path sortie failed, mission halted"
            );
        }
        Ok(())
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.phase == DispatchPhase::Running {
            state.phase = DispatchPhase::Paused;
        }
    }

    pub async fn resume(&self) -> Result<(), DispatchError> {
        {
            let mut state = self.state.lock();
            if state.phase != DispatchPhase::Paused {
                return Err(DispatchError::InvalidPhase(
                    self.mission_id.to_string(),
                    state.phase,
                    "resume",
                ));
            }
            state.phase = DispatchPhase::Running;
        }
        let sorties = self.store.sorties_for_mission(&self.mission_id, None).await?;
        self.spawn_ready(&sorties).await
    }

    /// Stop the mission: release every tracked specialist's locks and mark
    /// the mission cancelled.
    pub async fn cancel(&self) -> Result<(), DispatchError> {
        let now = self.now();
        let tracked = self.tracked_specialists();
        for specialist_id in &tracked {
            self.coordinator.release_all_for(specialist_id).await?;
        }
        {
            let mut state = self.state.lock();
            state.phase = DispatchPhase::Completed;
            state.specialists.clear();
        }
        self.store
            .set_mission_status(&self.mission_id, MissionStatus::Cancelled, now)
            .await?;
        tracing::info!(mission = %self.mission_id, "mission cancelled");
        Ok(())
    }

    /// Write a checkpoint; failures degrade (logged) but never interrupt
    /// the orchestrator.
    async fn create_checkpoint(&self, trigger: CheckpointTrigger) {
        match self.checkpoints.create(&self.mission_id, trigger, "dispatcher").await {
            Ok(checkpoint) => {
                let mut state = self.state.lock();
                state.last_checkpoint_ms = self.clock.epoch_ms();
                drop(state);
                tracing::debug!(
                    mission = %self.mission_id,
                    checkpoint = %checkpoint.id,
                    trigger = %trigger,
                    "checkpoint written"
                );
            }
            Err(e) => {
                tracing::warn!(mission = %self.mission_id, error = %e, "checkpoint failed");
            }
        }
    }

    fn on_critical_path(&self, sorties: &[Sortie], sortie_id: &str) -> bool {
        let nodes: Vec<ResolverNode> = sorties
            .iter()
            .map(|s| ResolverNode {
                id: s.id.to_string(),
                dependencies: s
                    .dependencies
                    .iter()
                    .map(|d| format!("{}.{}", s.mission_id, d))
                    .collect(),
                estimated_duration_ms: s.estimated_duration_ms,
            })
            .collect();
        let resolution = resolve_dependencies(&nodes);
        resolution.critical_path.iter().any(|id| id == sortie_id)
    }

    async fn require_mission(&self) -> Result<Mission, DispatchError> {
        self.store
            .get_mission(&self.mission_id)
            .await?
            .ok_or_else(|| DispatchError::MissionNotFound(self.mission_id.to_string()))
    }

    async fn require_specialist(
        &self,
        id: &SpecialistId,
    ) -> Result<Specialist, DispatchError> {
        self.store
            .get_specialist(id)
            .await?
            .ok_or_else(|| DispatchError::SpecialistNotFound(id.to_string()))
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

/// Shared construction dependencies for dispatchers.
pub struct DispatchDeps<C: Clock> {
    pub store: Store,
    pub coordinator: Arc<LockCoordinator<C>>,
    pub checkpoints: Arc<CheckpointService<C>>,
    pub launcher: Arc<dyn SpecialistLauncher>,
    pub clock: C,
    pub config: DispatchConfig,
}

/// Server-owned set of live dispatchers, one per mission. No process-global
/// state: everything reachable from here was passed in at construction.
pub struct DispatchRegistry<C: Clock> {
    deps: DispatchDeps<C>,
    dispatchers: Mutex<HashMap<String, Arc<Dispatcher<C>>>>,
}

impl<C: Clock> DispatchRegistry<C> {
    pub fn new(deps: DispatchDeps<C>) -> Self {
        Self { deps, dispatchers: Mutex::new(HashMap::new()) }
    }

    /// Get or create the dispatcher for a mission.
    pub fn ensure(&self, mission_id: &MissionId) -> Arc<Dispatcher<C>> {
        let mut dispatchers = self.dispatchers.lock();
        dispatchers
            .entry(mission_id.to_string())
            .or_insert_with(|| Arc::new(Dispatcher::new(mission_id.clone(), &self.deps)))
            .clone()
    }

    pub fn get(&self, mission_id: &MissionId) -> Option<Arc<Dispatcher<C>>> {
        self.dispatchers.lock().get(mission_id.as_str()).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Dispatcher<C>>> {
        self.dispatchers.lock().values().cloned().collect()
    }

    pub fn remove(&self, mission_id: &MissionId) {
        self.dispatchers.lock().remove(mission_id.as_str());
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
