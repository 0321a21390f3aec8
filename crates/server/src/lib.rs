// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ft-server: the fleet coordination daemon (`fleetd`).
//!
//! Owns the store, the lock coordinator, the per-mission dispatchers, and
//! the checkpoint/recovery services; exposes everything over the HTTP API.

pub mod api;
pub mod checkpoint;
pub mod coordinator;
pub mod dispatch;
pub mod env;
pub mod lifecycle;
pub mod recovery;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

pub use lifecycle::{startup, Config, ServerCtx, ServerHandle};
