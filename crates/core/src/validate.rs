// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sortie-tree validation for the decompose endpoint.
//!
//! Runs before anything persists: a tree that fails here leaves no trace in
//! the store. Errors carry machine-readable codes plus structured details.

use crate::path::canonical_path;
use crate::sortie::SortieType;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Planner-produced sortie, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortieDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<String>,
    /// Files this sortie creates; exempt from overlap checks.
    #[serde(default)]
    pub new_files: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default = "default_complexity")]
    pub complexity: u8,
    #[serde(rename = "type", default = "default_sortie_type")]
    pub sortie_type: SortieType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,
}

fn default_complexity() -> u8 {
    3
}

fn default_sortie_type() -> SortieType {
    SortieType::Task
}

/// Machine-readable validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingField,
    InvalidEnum,
    BadDependency,
    CircularDependency,
    FileOverlap,
}

crate::simple_display! {
    ValidationCode {
        MissingField => "MISSING_FIELD",
        InvalidEnum => "INVALID_ENUM",
        BadDependency => "BAD_DEPENDENCY",
        CircularDependency => "CIRCULAR_DEPENDENCY",
        FileOverlap => "FILE_OVERLAP",
    }
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ValidationError {
    fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validate a sortie tree. Empty result means the tree may be persisted.
pub fn validate_sortie_tree(drafts: &[SortieDraft]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if drafts.is_empty() {
        errors.push(ValidationError::new(
            ValidationCode::MissingField,
            "mission must contain at least one sortie",
        ));
        return errors;
    }

    for (i, draft) in drafts.iter().enumerate() {
        if draft.title.trim().is_empty() {
            errors.push(
                ValidationError::new(
                    ValidationCode::MissingField,
                    format!("sortie {} has no title", i),
                )
                .with_details(json!({"sortie": i, "field": "title"})),
            );
        }
        if !(1..=5).contains(&draft.complexity) {
            errors.push(
                ValidationError::new(
                    ValidationCode::InvalidEnum,
                    format!("sortie {} complexity {} outside [1,5]", i, draft.complexity),
                )
                .with_details(json!({"sortie": i, "complexity": draft.complexity})),
            );
        }
    }

    // Cycles first: a cyclic tree also violates the smaller-index rule, and
    // the cycle is the diagnosis the caller can act on.
    if let Some(cycle) = find_index_cycle(drafts) {
        errors.push(
            ValidationError::new(ValidationCode::CircularDependency, "circular dependency")
                .with_details(json!({"cycle": cycle})),
        );
        return errors;
    }

    for (i, draft) in drafts.iter().enumerate() {
        for &dep in &draft.dependencies {
            if dep as usize >= drafts.len() {
                errors.push(
                    ValidationError::new(
                        ValidationCode::BadDependency,
                        format!("sortie {} depends on unknown sortie {}", i, dep),
                    )
                    .with_details(json!({"sortie": i, "dependency": dep})),
                );
            } else if dep as usize >= i {
                errors.push(
                    ValidationError::new(
                        ValidationCode::BadDependency,
                        format!("sortie {} may only depend on earlier sorties, got {}", i, dep),
                    )
                    .with_details(json!({"sortie": i, "dependency": dep})),
                );
            }
        }
    }

    // File overlap across sorties, on canonical paths, skipping new files.
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (i, draft) in drafts.iter().enumerate() {
        for file in &draft.files {
            let canonical = canonical_path(file);
            if draft.new_files.iter().any(|n| canonical_path(n) == canonical) {
                continue;
            }
            match seen.get(&canonical) {
                Some(&first) if first != i => {
                    errors.push(
                        ValidationError::new(
                            ValidationCode::FileOverlap,
                            format!("file {} appears in sorties {} and {}", canonical, first, i),
                        )
                        .with_details(json!({"file": canonical, "sorties": [first, i]})),
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(canonical, i);
                }
            }
        }
    }

    errors
}

/// DFS over dependency indices; returns the first cycle as `[a, b, .., a]`.
fn find_index_cycle(drafts: &[SortieDraft]) -> Option<Vec<u32>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    let mut marks = vec![Mark::White; drafts.len()];
    let mut path: Vec<usize> = Vec::new();

    for start in 0..drafts.len() {
        if marks[start] != Mark::White {
            continue;
        }
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(&(n, edge)) = work.last() {
            if edge == 0 {
                marks[n] = Mark::Grey;
                path.push(n);
            }
            let deps = &drafts[n].dependencies;
            if edge < deps.len() {
                if let Some(last) = work.last_mut() {
                    last.1 += 1;
                }
                let dep = deps[edge] as usize;
                if dep >= drafts.len() {
                    continue; // reported separately as BadDependency
                }
                match marks[dep] {
                    Mark::Grey => {
                        let from = path.iter().position(|&p| p == dep).unwrap_or(0);
                        let mut cycle: Vec<u32> =
                            path[from..].iter().map(|&p| p as u32).collect();
                        cycle.push(dep as u32);
                        return Some(cycle);
                    }
                    Mark::White => work.push((dep, 0)),
                    Mark::Black => {}
                }
            } else {
                marks[n] = Mark::Black;
                path.pop();
                work.pop();
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
