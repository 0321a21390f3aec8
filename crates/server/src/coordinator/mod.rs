// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock coordinator: exclusive time-bounded file reservations with a
//! per-file FIFO waiter queue, an expiry sweeper, and conflict diagnostics.
//!
//! The durable state (locks, conflicts) lives in the store; the waiter
//! queues are in-memory - a waiting specialist that never gets its grant
//! re-requests on its own retry schedule, so queue loss on restart is
//! self-healing.

use ft_core::lock::{Lock, LockId, LockPurpose};
use ft_core::path::canonical_path;
use ft_core::specialist::SpecialistId;
use ft_core::Clock;
use ft_storage::{AcquireOutcome, ReleaseOutcome, StorageError, Store};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Default reservation window when the caller names none.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 300_000;

/// Conflict diagnostics older than this are pruned by the sweeper.
pub const CONFLICT_HORIZON_MS: u64 = 3_600_000;

/// A queued acquisition request.
#[derive(Debug, Clone, PartialEq)]
struct Waiter {
    specialist_id: SpecialistId,
    purpose: LockPurpose,
    timeout_ms: u64,
    enqueued_at_ms: u64,
}

/// Outcome of an acquire request, as the coordinator sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum LockRequestOutcome {
    Acquired(Lock),
    /// Another specialist holds the file; the request is queued FIFO.
    Queued { position: usize, existing: Lock },
    /// The requester already holds the file. Refused, never queued —
    /// retrying after release is the advisable path.
    SelfConflict(Lock),
}

/// Grants exclusive file reservations and drives the waiter queues.
pub struct LockCoordinator<C: Clock> {
    store: Store,
    clock: C,
    queues: Mutex<HashMap<String, VecDeque<Waiter>>>,
}

impl<C: Clock> LockCoordinator<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self { store, clock, queues: Mutex::new(HashMap::new()) }
    }

    /// Acquire an exclusive reservation on `file` (canonicalized here).
    pub async fn acquire(
        &self,
        specialist: &SpecialistId,
        file: &str,
        purpose: LockPurpose,
        timeout_ms: Option<u64>,
    ) -> Result<LockRequestOutcome, StorageError> {
        let file = canonical_path(file);
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_LOCK_TIMEOUT_MS);
        let now_ms = self.clock.epoch_ms();

        match self.store.try_acquire_lock(specialist, &file, purpose, timeout_ms, now_ms).await? {
            AcquireOutcome::Acquired(lock) => {
                self.remove_waiter(&file, specialist);
                tracing::info!(file = %file, holder = %specialist, "lock acquired");
                Ok(LockRequestOutcome::Acquired(lock))
            }
            AcquireOutcome::Conflict(existing) => {
                if existing.reserved_by == *specialist {
                    tracing::debug!(file = %file, holder = %specialist, "self re-acquire refused");
                    return Ok(LockRequestOutcome::SelfConflict(existing));
                }
                let position = self.enqueue(&file, specialist, purpose, timeout_ms, now_ms);
                tracing::info!(
                    file = %file,
                    holder = %existing.reserved_by,
                    requester = %specialist,
                    position,
                    "lock conflict, request queued"
                );
                Ok(LockRequestOutcome::Queued { position, existing })
            }
        }
    }

    /// Release a lock (owner-only unless `force`); a successful release
    /// immediately offers the file to the queue head.
    pub async fn release(
        &self,
        lock_id: &LockId,
        specialist: &SpecialistId,
        force: bool,
    ) -> Result<ReleaseOutcome, StorageError> {
        let now_ms = self.clock.epoch_ms();
        let outcome = self.store.release_lock(lock_id, specialist, force, now_ms).await?;
        if let ReleaseOutcome::Released(lock) = &outcome {
            tracing::info!(file = %lock.file, force, "lock released");
            self.process_queue(&lock.file).await?;
        }
        Ok(outcome)
    }

    /// Release every lock a specialist holds (sortie completion, failure).
    pub async fn release_all_for(&self, specialist: &SpecialistId) -> Result<(), StorageError> {
        let now_ms = self.clock.epoch_ms();
        let files = self.store.release_locks_held_by(specialist, now_ms).await?;
        for file in files {
            self.process_queue(&file).await?;
        }
        Ok(())
    }

    /// One expiry-sweeper pass: expire overdue locks, offer their files to
    /// waiters, prune stale conflict diagnostics. Returns expired locks.
    pub async fn sweep(&self) -> Result<Vec<Lock>, StorageError> {
        let now_ms = self.clock.epoch_ms();
        let expired = self.store.expire_due_locks(now_ms).await?;
        for lock in &expired {
            tracing::info!(file = %lock.file, holder = %lock.reserved_by, "lock expired");
            self.process_queue(&lock.file).await?;
        }
        self.store
            .prune_conflicts(now_ms.saturating_sub(CONFLICT_HORIZON_MS))
            .await?;
        Ok(expired)
    }

    /// One queue-processor pass over every file with waiters.
    pub async fn tick_queues(&self) -> Result<(), StorageError> {
        let files: Vec<String> = {
            let queues = self.queues.lock();
            queues
                .iter()
                .filter(|(_, q)| !q.is_empty())
                .map(|(file, _)| file.clone())
                .collect()
        };
        for file in files {
            self.process_queue(&file).await?;
        }
        Ok(())
    }

    pub async fn active_locks(&self) -> Result<Vec<Lock>, StorageError> {
        self.store.active_locks().await
    }

    /// Total queued waiters across all files.
    pub fn queued_waiters(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Attempt to grant the file to the queue head. On a race with a fresh
    /// acquirer the waiter stays at the head for the next tick.
    async fn process_queue(&self, file: &str) -> Result<(), StorageError> {
        loop {
            let Some(waiter) = self.peek_waiter(file) else {
                return Ok(());
            };
            let now_ms = self.clock.epoch_ms();
            match self
                .store
                .try_acquire_lock(
                    &waiter.specialist_id,
                    file,
                    waiter.purpose,
                    waiter.timeout_ms,
                    now_ms,
                )
                .await?
            {
                AcquireOutcome::Acquired(lock) => {
                    self.remove_waiter(file, &waiter.specialist_id);
                    tracing::info!(
                        file = %file,
                        holder = %lock.reserved_by,
                        waited_ms = now_ms.saturating_sub(waiter.enqueued_at_ms),
                        "queued lock granted"
                    );
                    // The grant re-occupies the file; later waiters keep
                    // waiting for the next release.
                    return Ok(());
                }
                AcquireOutcome::Conflict(holder) => {
                    // Stale self-entries can linger when a waiter acquired
                    // through a direct retry; drop them and keep going.
                    if holder.reserved_by == waiter.specialist_id {
                        self.remove_waiter(file, &waiter.specialist_id);
                        continue;
                    }
                    return Ok(());
                }
            }
        }
    }

    fn enqueue(
        &self,
        file: &str,
        specialist: &SpecialistId,
        purpose: LockPurpose,
        timeout_ms: u64,
        now_ms: u64,
    ) -> usize {
        let mut queues = self.queues.lock();
        let queue = queues.entry(file.to_string()).or_default();
        if let Some(pos) = queue.iter().position(|w| w.specialist_id == *specialist) {
            return pos + 1;
        }
        queue.push_back(Waiter {
            specialist_id: specialist.clone(),
            purpose,
            timeout_ms,
            enqueued_at_ms: now_ms,
        });
        queue.len()
    }

    fn peek_waiter(&self, file: &str) -> Option<Waiter> {
        self.queues.lock().get(file).and_then(|q| q.front().cloned())
    }

    fn remove_waiter(&self, file: &str, specialist: &SpecialistId) {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get_mut(file) {
            queue.retain(|w| w.specialist_id != *specialist);
            if queue.is_empty() {
                queues.remove(file);
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
