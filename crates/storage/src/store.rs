// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store handle: a cheap-to-clone wrapper over the SQLite pool.
//!
//! Operation groups live in sibling modules (`events`, `locks`,
//! `missions`, ...) as `impl Store` blocks; this module holds the handle,
//! constructors, and shared row-decoding helpers.

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

/// Handle to the coordination store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// In-memory store, for tests and the last-resort fallback.
    pub async fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(crate::db::open_memory().await?))
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool; outstanding operations finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode a `rename_all`'d enum from its stored text form.
pub(crate) fn enum_from_str<T: DeserializeOwned>(
    what: &'static str,
    s: &str,
) -> Result<T, StorageError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| StorageError::Corrupt(what, s.to_string()))
}

/// Encode a `rename_all`'d enum to its stored text form.
pub(crate) fn enum_to_str<T: Serialize>(value: &T) -> Result<String, StorageError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StorageError::Corrupt("enum", other.to_string())),
    }
}

/// Decode a JSON column that holds a list.
pub(crate) fn json_list<T: DeserializeOwned>(
    what: &'static str,
    s: &str,
) -> Result<Vec<T>, StorageError> {
    serde_json::from_str(s).map_err(|_| StorageError::Corrupt(what, s.to_string()))
}

/// Millisecond columns are stored as `INTEGER`; clamp the sign on the way out.
pub(crate) fn ms(v: i64) -> u64 {
    v.max(0) as u64
}
