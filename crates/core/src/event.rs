// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the fleet coordination server.
//!
//! Every observable state change is recorded as an event; projections are
//! derived from events inside the same transaction. [`EventPayload`] is the
//! typed registry of known event kinds; foreign mailbox appends round-trip
//! through [`EventPayload::Custom`] untouched.

use crate::blocker::BlockerKind;
use crate::checkpoint::CheckpointTrigger;
use crate::lock::{LockId, LockPurpose};
use crate::message::MessageId;
use crate::mission::{MissionId, MissionStatus, Strategy};
use crate::sortie::{SortieId, SortieStatus};
use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};

/// Reserved for future event-schema migration; never branched on.
pub const SCHEMA_VERSION: i64 = 1;

/// Stream type tags used to key the event log.
pub mod stream_types {
    pub const MISSION: &str = "mission";
    pub const SPECIALIST: &str = "specialist";
    pub const LOCK: &str = "lock";
    pub const MAILBOX: &str = "mailbox";
    pub const SYSTEM: &str = "system";
}

crate::define_id! {
    /// Unique identifier for an event record.
    pub struct EventId("evt-");
}

/// Typed payloads for events the server itself emits.
///
/// Serializes with `{"type": "noun:verb", ...fields}` format. Unknown type
/// tags are preserved via [`EventPayload::Custom`] instead of being
/// rejected, so mailboxes can carry foreign event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    // -- mission --
    #[serde(rename = "mission:created")]
    MissionCreated {
        id: MissionId,
        title: String,
        strategy: Strategy,
        total_sorties: u32,
    },

    #[serde(rename = "mission:status_changed")]
    MissionStatusChanged {
        id: MissionId,
        status: MissionStatus,
        #[serde(default)]
        completed_sorties: u32,
    },

    #[serde(rename = "mission:deleted")]
    MissionDeleted { id: MissionId },

    // -- sortie --
    #[serde(rename = "sortie:status_changed")]
    SortieStatusChanged {
        id: SortieId,
        status: SortieStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned_to: Option<SpecialistId>,
    },

    #[serde(rename = "sortie:progress")]
    SortieProgress {
        id: SortieId,
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },

    // -- specialist --
    #[serde(rename = "specialist:registered")]
    SpecialistRegistered {
        id: SpecialistId,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        capabilities: Vec<String>,
    },

    #[serde(rename = "specialist:spawned")]
    SpecialistSpawned {
        id: SpecialistId,
        mission_id: MissionId,
        sortie_id: SortieId,
    },

    #[serde(rename = "specialist:heartbeat")]
    SpecialistHeartbeat { id: SpecialistId },

    #[serde(rename = "specialist:blocker_handled")]
    SpecialistBlockerHandled {
        id: SpecialistId,
        kind: BlockerKind,
        retry_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_sortie: Option<SortieId>,
    },

    // -- lock --
    #[serde(rename = "lock:acquired")]
    LockAcquired {
        id: LockId,
        file: String,
        reserved_by: SpecialistId,
        expires_at_ms: u64,
        purpose: LockPurpose,
    },

    #[serde(rename = "lock:released")]
    LockReleased {
        id: LockId,
        file: String,
        released_by: SpecialistId,
    },

    #[serde(rename = "lock:expired")]
    LockExpired { id: LockId, file: String },

    #[serde(rename = "lock:force_released")]
    LockForceReleased { id: LockId, file: String },

    // -- checkpoint / recovery --
    #[serde(rename = "checkpoint:created")]
    CheckpointCreated {
        id: crate::checkpoint::CheckpointId,
        mission_id: MissionId,
        trigger: CheckpointTrigger,
        progress_percent: f64,
    },

    #[serde(rename = "context:compacted")]
    ContextCompacted { mission_id: MissionId, idle_ms: u64 },

    #[serde(rename = "fleet:recovered")]
    FleetRecovered {
        mission_id: MissionId,
        checkpoint_id: crate::checkpoint::CheckpointId,
        sorties_restored: u32,
        locks_restored: u32,
        messages_requeued: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },

    // -- messaging --
    #[serde(rename = "message:sent")]
    MessageSent {
        id: MessageId,
        from: SpecialistId,
        to: Vec<SpecialistId>,
        subject: String,
    },

    #[serde(rename = "message:delivered")]
    MessageDelivered { id: MessageId },

    #[serde(rename = "cursor:advanced")]
    CursorAdvanced {
        stream_id: String,
        consumer_id: String,
        position: i64,
    },

    /// Foreign event kind carried by a mailbox; stored verbatim.
    #[serde(skip)]
    Custom {
        event_type: String,
        data: serde_json::Value,
    },
}

impl EventPayload {
    /// The wire tag for this payload.
    pub fn event_type(&self) -> &str {
        match self {
            EventPayload::MissionCreated { .. } => "mission:created",
            EventPayload::MissionStatusChanged { .. } => "mission:status_changed",
            EventPayload::MissionDeleted { .. } => "mission:deleted",
            EventPayload::SortieStatusChanged { .. } => "sortie:status_changed",
            EventPayload::SortieProgress { .. } => "sortie:progress",
            EventPayload::SpecialistRegistered { .. } => "specialist:registered",
            EventPayload::SpecialistSpawned { .. } => "specialist:spawned",
            EventPayload::SpecialistHeartbeat { .. } => "specialist:heartbeat",
            EventPayload::SpecialistBlockerHandled { .. } => "specialist:blocker_handled",
            EventPayload::LockAcquired { .. } => "lock:acquired",
            EventPayload::LockReleased { .. } => "lock:released",
            EventPayload::LockExpired { .. } => "lock:expired",
            EventPayload::LockForceReleased { .. } => "lock:force_released",
            EventPayload::CheckpointCreated { .. } => "checkpoint:created",
            EventPayload::ContextCompacted { .. } => "context:compacted",
            EventPayload::FleetRecovered { .. } => "fleet:recovered",
            EventPayload::MessageSent { .. } => "message:sent",
            EventPayload::MessageDelivered { .. } => "message:delivered",
            EventPayload::CursorAdvanced { .. } => "cursor:advanced",
            EventPayload::Custom { event_type, .. } => event_type,
        }
    }

    /// Serialize to the stored JSON form (tag included for typed variants).
    pub fn to_data(&self) -> serde_json::Value {
        match self {
            EventPayload::Custom { data, .. } => data.clone(),
            typed => serde_json::to_value(typed).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Rebuild a payload from stored `(event_type, data)` columns.
    ///
    /// Unknown or shape-mismatched tags come back as [`EventPayload::Custom`]
    /// rather than an error - the log must replay regardless of what was
    /// appended to a mailbox.
    pub fn from_stored(event_type: &str, data: &serde_json::Value) -> Self {
        let mut tagged = data.clone();
        if let serde_json::Value::Object(map) = &mut tagged {
            map.entry("type")
                .or_insert_with(|| serde_json::Value::String(event_type.to_string()));
        }
        match serde_json::from_value::<EventPayload>(tagged) {
            Ok(payload) if payload.event_type() == event_type => payload,
            _ => EventPayload::Custom {
                event_type: event_type.to_string(),
                data: data.clone(),
            },
        }
    }
}

/// An immutable fact about a stream, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub stream_type: String,
    pub stream_id: String,
    /// Gap-free, strictly increasing from 1 within the stream.
    pub sequence_number: i64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub occurred_at_ms: u64,
    pub recorded_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub schema_version: i64,
}

impl EventRecord {
    pub fn payload(&self) -> EventPayload {
        EventPayload::from_stored(&self.event_type, &self.data)
    }
}

/// Input to an event append, before a sequence number is allocated.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub occurred_at_ms: Option<u64>,
    pub causation_id: Option<String>,
    pub correlation_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
