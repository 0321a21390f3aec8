// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error taxonomy.

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unique-constraint race on an event sequence number; retried
    /// internally, surfaced only once the retry budget is spent.
    #[error("append conflict on stream {0}")]
    AppendConflict(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("invalid stored value for {0}: {1}")]
    Corrupt(&'static str, String),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound(entity, id.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(..))
    }

    /// True for the unique-violation errors SQLite reports on the
    /// `(stream_type, stream_id, sequence_number)` index or the active-lock
    /// partial index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::Db(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}
