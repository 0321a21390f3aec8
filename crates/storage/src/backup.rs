// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint file backups.
//!
//! Secondary persistence for checkpoints: one JSON file per checkpoint
//! under `<root>/<mission_id>/<checkpoint_id>.json` with a `latest.json`
//! pointer per mission. Reads prefer the primary store; these files exist
//! so a mission can still resume when the database is gone. A corrupt file
//! is rotated to `.bak` and skipped, never fatal.

use crate::error::StorageError;
use ft_core::checkpoint::{Checkpoint, CheckpointId};
use ft_core::mission::MissionId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Contents of a mission's `latest.json` pointer.
#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    checkpoint_id: String,
    timestamp_ms: u64,
}

/// File-backed checkpoint store rooted at `<data_root>/checkpoints`.
#[derive(Debug, Clone)]
pub struct CheckpointBackup {
    root: PathBuf,
}

impl CheckpointBackup {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mission_dir(&self, mission_id: &MissionId) -> PathBuf {
        self.root.join(mission_id.as_str())
    }

    fn checkpoint_path(&self, mission_id: &MissionId, id: &CheckpointId) -> PathBuf {
        self.mission_dir(mission_id).join(format!("{}.json", id))
    }

    /// Write the checkpoint file and update the `latest.json` pointer.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let dir = self.mission_dir(&checkpoint.mission_id);
        fs::create_dir_all(&dir)?;

        let path = self.checkpoint_path(&checkpoint.mission_id, &checkpoint.id);
        let json = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&path, json)?;

        let pointer = LatestPointer {
            checkpoint_id: checkpoint.id.to_string(),
            timestamp_ms: checkpoint.timestamp_ms,
        };
        fs::write(dir.join("latest.json"), serde_json::to_string(&pointer)?)?;
        Ok(())
    }

    /// Load one checkpoint file. Corrupt JSON rotates the file to `.bak`
    /// and reads as absent.
    pub fn load(
        &self,
        mission_id: &MissionId,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>, StorageError> {
        self.load_path(&self.checkpoint_path(mission_id, id))
    }

    /// Find a checkpoint file by id without knowing its mission, scanning
    /// the per-mission directories. Used for by-id reads on primary miss.
    pub fn find(&self, id: &CheckpointId) -> Result<Option<Checkpoint>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        for entry in entries.flatten() {
            let candidate = entry.path().join(format!("{}.json", id));
            if candidate.exists() {
                return self.load_path(&candidate);
            }
        }
        Ok(None)
    }

    /// Load the checkpoint the mission's `latest.json` points at.
    pub fn load_latest(&self, mission_id: &MissionId) -> Result<Option<Checkpoint>, StorageError> {
        let dir = self.mission_dir(mission_id);
        let pointer_path = dir.join("latest.json");
        if !pointer_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&pointer_path)?;
        let pointer: LatestPointer = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %pointer_path.display(), error = %e, "corrupt latest pointer");
                rotate_to_bak(&pointer_path);
                return Ok(None);
            }
        };
        self.load_path(&dir.join(format!("{}.json", pointer.checkpoint_id)))
    }

    fn load_path(&self, path: &Path) -> Result<Option<Checkpoint>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        match serde_json::from_str(&raw) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt checkpoint backup, rotating");
                rotate_to_bak(path);
                Ok(None)
            }
        }
    }

    /// Remove the file for a pruned checkpoint; pointer files are left to
    /// be rewritten by the next write.
    pub fn remove(&self, mission_id: &MissionId, id: &CheckpointId) {
        let path = self.checkpoint_path(mission_id, id);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove checkpoint backup");
            }
        }
    }

    /// Remove a mission's whole backup directory (mission deletion).
    pub fn remove_mission(&self, mission_id: &MissionId) {
        let dir = self.mission_dir(mission_id);
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove checkpoint dir");
            }
        }
    }
}

/// Rotate a corrupt file out of the way, keeping up to [`MAX_BAK_FILES`]
/// backups: `.bak`, `.bak.2`, `.bak.3`. The oldest is evicted at capacity.
fn rotate_to_bak(path: &Path) {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    let _ = fs::rename(path, bak(1));
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
