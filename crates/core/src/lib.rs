// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ft-core: Core library for the FleetTools coordination server

pub mod macros;

pub mod blocker;
pub mod checkpoint;
pub mod clock;
pub mod event;
pub mod id;
pub mod lock;
pub mod message;
pub mod mission;
pub mod path;
pub mod resolver;
pub mod sortie;
pub mod specialist;
pub mod time_fmt;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use blocker::{
    BackoffPolicy, BlockerKind, BlockerReport, BlockerResolution, DependencyState, NextAction,
    ResolutionStatus,
};
pub use checkpoint::{
    Checkpoint, CheckpointId, CheckpointTrigger, LockSnapshot, RecoveryContext, SortieSnapshot,
    CHECKPOINT_VERSION,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{stream_types, EventId, EventPayload, EventRecord, NewEvent, SCHEMA_VERSION};
pub use id::short;
pub use lock::{Lock, LockId, LockPurpose, LockStatus};
pub use message::{Message, MessageId};
pub use mission::{Mission, MissionId, MissionStatus, Strategy};
pub use path::canonical_path;
pub use resolver::{resolve_dependencies, Resolution, ResolverNode};
pub use sortie::{Sortie, SortieId, SortieStatus, SortieType};
pub use specialist::{Specialist, SpecialistId, SpecialistStatus};
pub use time_fmt::format_elapsed_ms;
pub use validate::{validate_sortie_tree, SortieDraft, ValidationCode, ValidationError};
