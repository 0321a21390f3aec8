// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inter-specialist messages carried by mailbox streams.

use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a message.
    pub struct MessageId("msg-");
}

/// A message exchanged between specialists via a mailbox.
///
/// Undelivered messages are snapshotted into checkpoints and requeued by
/// recovery, keyed by `id` so requeueing is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: SpecialistId,
    pub to: Vec<SpecialistId>,
    pub subject: String,
    pub payload: serde_json::Value,
    pub sent_at_ms: u64,
    pub delivered: bool,
}
