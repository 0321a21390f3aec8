// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server lifecycle management: startup, shutdown, owned services.

use crate::checkpoint::CheckpointService;
use crate::coordinator::LockCoordinator;
use crate::dispatch::{
    DispatchConfig, DispatchDeps, DispatchPhase, DispatchRegistry, LogLauncher, SpecialistLauncher,
};
use crate::recovery::RecoveryService;
use crate::tasks::BackgroundTasks;
use ft_core::checkpoint::CheckpointTrigger;
use ft_core::{Clock, SystemClock};
use ft_storage::{open_store, CheckpointBackup, DbLocation, StorageError, Store};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (db file, checkpoints, pid, logs)
    pub data_root: PathBuf,
    /// HTTP listen port
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self { data_root: crate::env::data_root(), port: crate::env::port() }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.data_root.join("fleetd.pid")
    }

    pub fn checkpoints_root(&self) -> PathBuf {
        self.data_root.join("checkpoints")
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire pid lock: server already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The server's owned services. No process-global state: every component
/// reachable from here was constructed at startup and is dropped at
/// shutdown, so tests can run many servers side by side.
pub struct ServerCtx<C: Clock> {
    pub store: Store,
    pub coordinator: Arc<LockCoordinator<C>>,
    pub dispatch: DispatchRegistry<C>,
    pub checkpoints: Arc<CheckpointService<C>>,
    pub recovery: RecoveryService<C>,
    pub clock: C,
}

impl<C: Clock> ServerCtx<C> {
    /// Wire the service graph over an open store.
    pub fn build(store: Store, checkpoints_root: PathBuf, clock: C) -> Arc<Self> {
        Self::build_with_launcher(store, checkpoints_root, clock, Arc::new(LogLauncher))
    }

    pub fn build_with_launcher(
        store: Store,
        checkpoints_root: PathBuf,
        clock: C,
        launcher: Arc<dyn SpecialistLauncher>,
    ) -> Arc<Self> {
        let backup = CheckpointBackup::new(checkpoints_root);
        let coordinator = Arc::new(LockCoordinator::new(store.clone(), clock.clone()));
        let checkpoints = Arc::new(CheckpointService::new(store.clone(), backup, clock.clone()));
        let recovery = RecoveryService::new(store.clone(), checkpoints.clone(), clock.clone());
        let dispatch = DispatchRegistry::new(DispatchDeps {
            store: store.clone(),
            coordinator: coordinator.clone(),
            checkpoints: checkpoints.clone(),
            launcher,
            clock: clock.clone(),
            config: DispatchConfig::default(),
        });
        Arc::new(Self { store, coordinator, dispatch, checkpoints, recovery, clock })
    }
}

/// Running server state returned by [`startup`].
pub struct ServerHandle {
    pub ctx: Arc<ServerCtx<SystemClock>>,
    pub location: DbLocation,
    pub tasks: BackgroundTasks,
    config: Config,
    // NOTE(lifetime): held to maintain the exclusive pid lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Bring the server up: pid lock, store, services, background tasks, and
/// the startup reconciliation pass.
pub async fn startup(config: &Config) -> Result<ServerHandle, LifecycleError> {
    std::fs::create_dir_all(&config.data_root)?;

    let lock_file = acquire_pid_lock(config)?;

    let (store, location) = open_store(&config.data_root).await?;
    info!(db = %location, "store ready");

    let ctx = ServerCtx::build(store, config.checkpoints_root(), SystemClock);

    // Startup reconciliation: surface stale missions immediately and apply
    // retention before the background cadence takes over.
    match ctx.recovery.scan_stale().await {
        Ok(candidates) if !candidates.is_empty() => {
            info!(count = candidates.len(), "stale missions awaiting recovery");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "startup stale scan failed"),
    }
    if let Err(e) = ctx.checkpoints.prune(None).await {
        warn!(error = %e, "startup checkpoint prune failed");
    }

    let tasks = crate::tasks::spawn(ctx.clone());

    Ok(ServerHandle { ctx, location, tasks, config: config.clone(), lock_file })
}

impl ServerHandle {
    /// Graceful shutdown: final checkpoints for running missions, one last
    /// expiry sweep, stop the background tasks, close the store.
    pub async fn shutdown(self) {
        info!("shutting down");

        for dispatcher in self.ctx.dispatch.all() {
            if dispatcher.phase() == DispatchPhase::Running {
                match self
                    .ctx
                    .checkpoints
                    .create(dispatcher.mission_id(), CheckpointTrigger::Manual, "shutdown")
                    .await
                {
                    Ok(ckpt) => info!(mission = %dispatcher.mission_id(), checkpoint = %ckpt.id, "shutdown checkpoint"),
                    Err(e) => warn!(mission = %dispatcher.mission_id(), error = %e, "shutdown checkpoint failed"),
                }
            }
        }

        if let Err(e) = self.ctx.coordinator.sweep().await {
            warn!(error = %e, "final sweep failed");
        }

        self.tasks.shutdown().await;
        self.ctx.store.close().await;

        let pid_path = self.config.pid_path();
        if pid_path.exists() {
            if let Err(e) = std::fs::remove_file(&pid_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("shutdown complete");
    }
}

fn acquire_pid_lock(config: &Config) -> Result<File, LifecycleError> {
    let mut file = File::create(config.pid_path())?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let _ = writeln!(file, "{}", std::process::id());
    Ok(file)
}
