// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File lock entity: a time-bounded exclusive reservation of a canonical path.

use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a file lock.
    pub struct LockId("lck-");
}

/// Why the file is being reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPurpose {
    Edit,
    Read,
    Delete,
}

crate::simple_display! {
    LockPurpose {
        Edit => "edit",
        Read => "read",
        Delete => "delete",
    }
}

/// Lock lifecycle status.
///
/// At most one `Active` lock may exist per canonical file path - enforced
/// by the store's schema, not just by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Active,
    Released,
    Expired,
    ForceReleased,
}

crate::simple_display! {
    LockStatus {
        Active => "active",
        Released => "released",
        Expired => "expired",
        ForceReleased => "force_released",
    }
}

/// Exclusive reservation of a file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub id: LockId,
    /// Canonicalized path - the lock key.
    pub file: String,
    pub reserved_by: SpecialistId,
    pub reserved_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at_ms: Option<u64>,
    pub purpose: LockPurpose,
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub status: LockStatus,
}

impl Lock {
    pub fn is_active(&self) -> bool {
        self.status == LockStatus::Active
    }

    /// An active lock past its deadline. The sweeper turns these into
    /// `Expired`; until then acquire treats them as absent.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.status == LockStatus::Active && self.expires_at_ms < now_ms
    }

    /// Active and within its deadline - the only state that blocks acquires.
    pub fn is_live(&self, now_ms: u64) -> bool {
        self.status == LockStatus::Active && self.expires_at_ms >= now_ms
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
