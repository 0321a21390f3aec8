// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server crate.

use std::path::PathBuf;
use std::time::Duration;

/// HTTP listen port. `PORT`, default 3001.
pub fn port() -> u16 {
    std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(3001)
}

/// Root data directory: `DATA_ROOT` > user-local data dir > `/tmp/fleet`.
pub fn data_root() -> PathBuf {
    if let Ok(dir) = std::env::var("DATA_ROOT") {
        return PathBuf::from(dir);
    }
    match dirs::data_local_dir() {
        Some(dir) => dir.join("fleet"),
        None => PathBuf::from("/tmp/fleet"),
    }
}

/// Log filter. `LOG_LEVEL`, default `info`.
pub fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Lock expiry sweeper interval (default 30 s, `FLEET_SWEEP_MS` for tests).
pub fn sweep_interval() -> Duration {
    ms_var("FLEET_SWEEP_MS").unwrap_or(Duration::from_secs(30))
}

/// Lock waiter-queue processor interval (default 1 s, `FLEET_QUEUE_MS`).
pub fn queue_interval() -> Duration {
    ms_var("FLEET_QUEUE_MS").unwrap_or(Duration::from_secs(1))
}

/// Stale-mission scan interval (default 60 s, `FLEET_STALE_MS`).
pub fn stale_scan_interval() -> Duration {
    ms_var("FLEET_STALE_MS").unwrap_or(Duration::from_secs(60))
}

/// Dispatcher monitor interval (default 5 s, `FLEET_MONITOR_MS`).
pub fn monitor_interval() -> Duration {
    ms_var("FLEET_MONITOR_MS").unwrap_or(Duration::from_secs(5))
}

/// Shutdown drain timeout (default 10 s, `FLEET_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    ms_var("FLEET_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// Per-request deadline (default 30 s, `FLEET_REQUEST_TIMEOUT_MS`).
pub fn request_timeout() -> Duration {
    ms_var("FLEET_REQUEST_TIMEOUT_MS").unwrap_or(Duration::from_secs(30))
}

fn ms_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}
