// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ft-storage: embedded SQLite store for the fleet coordination server.
//!
//! The event log is the source of truth; projection tables are written in
//! the same transaction as the events they reflect, so readers never
//! observe a projection that disagrees with the latest committed event.

mod backup;
mod checkpoints;
mod db;
mod error;
mod events;
mod locks;
mod mailboxes;
mod messages;
mod missions;
mod specialists;
mod store;

pub use backup::CheckpointBackup;
pub use checkpoints::{RestoreReport, RetentionPolicy};
pub use db::{open_store, DbLocation};
pub use error::StorageError;
pub use events::EventFilter;
pub use locks::{AcquireOutcome, LockConflict, ReleaseOutcome};
pub use mailboxes::{Cursor, Mailbox, MailboxEntry};
pub use missions::{MissionFilter, MissionPage, NewMission};
pub use store::Store;
