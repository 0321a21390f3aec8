// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocker classification and resolution policy.
//!
//! Pure decision logic: the dispatcher feeds in a report plus the current
//! retry count and gets back what to do. Attempt bookkeeping lives with the
//! caller, mirroring how the store tracks per-specialist retry counts.

use crate::sortie::SortieId;
use serde::{Deserialize, Serialize};

/// Kinds of blocker a specialist can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerKind {
    LockTimeout,
    ApiError,
    Dependency,
    Other,
}

crate::simple_display! {
    BlockerKind {
        LockTimeout => "lock_timeout",
        ApiError => "api_error",
        Dependency => "dependency",
        Other => "other",
    }
}

/// A specialist-reported blocker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerReport {
    pub kind: BlockerKind,
    pub description: String,
    /// Sortie the specialist is waiting on (dependency blockers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_sortie: Option<SortieId>,
    /// File involved (lock-timeout blockers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Exponential backoff schedule for retryable blockers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_ms: 1000, multiplier: 2, max_delay_ms: 60_000, max_retries: 5 }
    }
}

impl BackoffPolicy {
    /// Delay for the given zero-based retry count:
    /// `min(initial * multiplier^retry_count, max_delay)`.
    pub fn delay_ms(&self, retry_count: u32) -> u64 {
        let factor = u64::from(self.multiplier).saturating_pow(retry_count);
        self.initial_ms.saturating_mul(factor).min(self.max_delay_ms)
    }

    /// True once `retry_count` attempts have been spent.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

/// Outcome of handling a blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Retrying,
    Waiting,
    ManualInterventionRequired,
}

crate::simple_display! {
    ResolutionStatus {
        Resolved => "resolved",
        Retrying => "retrying",
        Waiting => "waiting",
        ManualInterventionRequired => "manual_intervention_required",
    }
}

/// What the specialist should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ResumeWork,
    RetryAfterBackoff,
    WaitForDependency,
    EscalateToOperator,
}

/// Resolution handed back to the dispatcher and the reporting specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerResolution {
    pub status: ResolutionStatus,
    pub resolution_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

/// State of the sortie a dependency blocker points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Completed,
    Pending,
    Missing,
}

/// Decide how to resolve a blocker.
///
/// `retry_count` is the number of retries already consumed for this
/// specialist+kind; `dependency` is only consulted for dependency blockers.
pub fn resolve(
    report: &BlockerReport,
    retry_count: u32,
    policy: &BackoffPolicy,
    dependency: Option<DependencyState>,
) -> BlockerResolution {
    match report.kind {
        BlockerKind::LockTimeout | BlockerKind::ApiError => {
            if policy.is_exhausted(retry_count) {
                return BlockerResolution {
                    status: ResolutionStatus::ManualInterventionRequired,
                    resolution_hint: format!(
                        "{} persisted after {} retries",
                        report.kind, policy.max_retries
                    ),
                    retry_after_ms: None,
                    next_action: Some(NextAction::EscalateToOperator),
                };
            }
            let delay = policy.delay_ms(retry_count);
            BlockerResolution {
                status: ResolutionStatus::Retrying,
                resolution_hint: format!("retry {} of {}", retry_count + 1, policy.max_retries),
                retry_after_ms: Some(delay),
                next_action: Some(NextAction::RetryAfterBackoff),
            }
        }
        BlockerKind::Dependency => match dependency {
            Some(DependencyState::Completed) => BlockerResolution {
                status: ResolutionStatus::Resolved,
                resolution_hint: "dependency completed".to_string(),
                retry_after_ms: None,
                next_action: Some(NextAction::ResumeWork),
            },
            Some(DependencyState::Pending) => BlockerResolution {
                status: ResolutionStatus::Waiting,
                resolution_hint: match &report.affected_sortie {
                    Some(id) => format!("waiting on sortie {}", id),
                    None => "waiting on dependency".to_string(),
                },
                retry_after_ms: None,
                next_action: Some(NextAction::WaitForDependency),
            },
            Some(DependencyState::Missing) | None => BlockerResolution {
                status: ResolutionStatus::ManualInterventionRequired,
                resolution_hint: "dependency sortie not found".to_string(),
                retry_after_ms: None,
                next_action: Some(NextAction::EscalateToOperator),
            },
        },
        BlockerKind::Other => BlockerResolution {
            status: ResolutionStatus::ManualInterventionRequired,
            resolution_hint: report.description.clone(),
            retry_after_ms: None,
            next_action: Some(NextAction::EscalateToOperator),
        },
    }
}

#[cfg(test)]
#[path = "blocker_tests.rs"]
mod tests;
