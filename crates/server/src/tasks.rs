// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background tasks: long-running cooperative loops owned by the server,
//! each with an explicit tick interval and a cancellation handle honored
//! at shutdown.

use crate::lifecycle::ServerCtx;
use ft_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handles to the spawned loops.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Cancel every loop and wait for it to finish its current iteration.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Spawn the server's background loops.
pub fn spawn<C: Clock>(ctx: Arc<ServerCtx<C>>) -> BackgroundTasks {
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    // Lock expiry sweeper (~30 s).
    handles.push(tick_loop(
        "sweeper",
        crate::env::sweep_interval(),
        cancel.clone(),
        {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = ctx.coordinator.sweep().await {
                        tracing::warn!(error = %e, "sweeper pass failed");
                    }
                }
            }
        },
    ));

    // Waiter-queue processor (~1 s).
    handles.push(tick_loop(
        "queue-processor",
        crate::env::queue_interval(),
        cancel.clone(),
        {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = ctx.coordinator.tick_queues().await {
                        tracing::warn!(error = %e, "queue pass failed");
                    }
                }
            }
        },
    ));

    // Stale-mission scan (~60 s).
    handles.push(tick_loop(
        "stale-scan",
        crate::env::stale_scan_interval(),
        cancel.clone(),
        {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = ctx.recovery.scan_stale().await {
                        tracing::warn!(error = %e, "stale scan failed");
                    }
                }
            }
        },
    ));

    // Dispatcher monitors (~5 s).
    handles.push(tick_loop(
        "monitor",
        crate::env::monitor_interval(),
        cancel.clone(),
        {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    for dispatcher in ctx.dispatch.all() {
                        if let Err(e) = dispatcher.monitor_tick().await {
                            tracing::warn!(
                                mission = %dispatcher.mission_id(),
                                error = %e,
                                "monitor tick failed"
                            );
                        }
                    }
                }
            }
        },
    ));

    // Checkpoint retention (daily; startup already ran one pass).
    handles.push(tick_loop(
        "checkpoint-pruner",
        Duration::from_secs(86_400),
        cancel.clone(),
        {
            let ctx = ctx.clone();
            move || {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = ctx.checkpoints.prune(None).await {
                        tracing::warn!(error = %e, "checkpoint prune failed");
                    }
                }
            }
        },
    ));

    BackgroundTasks { cancel, handles }
}

/// One cooperative loop: tick, run, repeat until cancelled. Each iteration
/// is a bounded piece of work; no mutex is held across an await.
fn tick_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut work: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup work does
        // not run twice.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "background task stopped");
                    return;
                }
                _ = interval.tick() => work().await,
            }
        }
    })
}
