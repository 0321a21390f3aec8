// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetd: the fleet coordination server.

use ft_server::{api, env, lifecycle, Config};
use std::future::IntoFuture;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::load();
    let _log_guard = init_tracing(&config);

    if let Err(e) = run(&config).await {
        error!(error = %e, "unrecoverable startup failure");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let handle = lifecycle::startup(config).await?;
    info!(
        port = config.port,
        data_root = %config.data_root.display(),
        db = %handle.location,
        "fleetd starting"
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|e| format!("failed to bind port {}: {}", config.port, e))?;

    let router = api::router(handle.ctx.clone());
    info!(port = config.port, "ready");

    let draining = tokio_util::sync::CancellationToken::new();
    let drain_started = draining.clone();
    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_started.cancel();
        })
        .into_future();

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = async {
            draining.cancelled().await;
            tokio::time::sleep(env::drain_timeout()).await;
        } => {
            tracing::warn!("drain window elapsed, abandoning in-flight requests");
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, then allow the drain window.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(drain = ?env::drain_timeout(), "shutdown signal received, draining");
}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(env::log_level()).unwrap_or_else(|_| EnvFilter::new("info"));

    // File logging is best-effort; stdout always works.
    let file_layer = std::fs::create_dir_all(&config.data_root).ok().map(|_| {
        let appender = tracing_appender::rolling::daily(&config.data_root, "fleetd.log");
        tracing_appender::non_blocking(appender)
    });

    match file_layer {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}
