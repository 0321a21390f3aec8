// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database bootstrap: open `squawk.db` with journaling, falling back to
//! `/tmp/fleet` and finally an in-memory store when the preferred path is
//! unwritable. The chosen location is logged once at startup.

use crate::error::StorageError;
use crate::store::Store;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the store ended up living.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl std::fmt::Display for DbLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbLocation::File(path) => write!(f, "{}", path.display()),
            DbLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Open the store under `data_root`, with fallbacks.
///
/// Fails only when every candidate (preferred file, `/tmp/fleet`, memory)
/// refuses to open - the caller treats that as fatal startup.
pub async fn open_store(data_root: &Path) -> Result<(Store, DbLocation), StorageError> {
    let preferred = data_root.join("squawk.db");
    match open_file(&preferred).await {
        Ok(pool) => {
            tracing::info!(db = %preferred.display(), "opened primary store");
            return Ok((Store::new(pool), DbLocation::File(preferred)));
        }
        Err(e) => {
            tracing::warn!(db = %preferred.display(), error = %e, "primary store unavailable");
        }
    }

    let fallback = PathBuf::from("/tmp/fleet").join("squawk.db");
    match open_file(&fallback).await {
        Ok(pool) => {
            tracing::warn!(db = %fallback.display(), "using fallback store path");
            return Ok((Store::new(pool), DbLocation::File(fallback)));
        }
        Err(e) => {
            tracing::warn!(db = %fallback.display(), error = %e, "fallback store unavailable");
        }
    }

    let pool = open_memory().await?;
    tracing::warn!("using in-memory store; state will not survive restart");
    Ok((Store::new(pool), DbLocation::Memory))
}

async fn open_file(path: &Path) -> Result<SqlitePool, StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// In-memory store for the last-resort fallback and for tests.
///
/// A single connection - every pool connection would otherwise get its own
/// empty database.
pub(crate) async fn open_memory() -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
