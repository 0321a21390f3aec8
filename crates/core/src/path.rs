// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path canonicalization for lock keys and sortie file identifiers.
//!
//! Lexical only: paths may name files that do not exist yet, so no
//! filesystem access. Canonicalize once on entry, store the canonical form.

/// Canonicalize a path string for use as a lock key.
///
/// - backslashes become forward slashes
/// - a Windows drive letter is lower-cased
/// - `.` segments drop, `..` segments pop (clamped at the root)
/// - trailing and duplicate separators collapse
pub fn canonical_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut chars = normalized.chars();

    // Lower-case "C:/..." style prefixes.
    let normalized = match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_uppercase() => {
            let mut s = String::with_capacity(normalized.len());
            s.push(drive.to_ascii_lowercase());
            s.push(':');
            s.extend(chars);
            s
        }
        _ => normalized,
    };

    let absolute = normalized.starts_with('/');
    let has_drive = normalized.len() >= 2 && normalized.as_bytes()[1] == b':';

    let mut parts: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Keep the drive prefix; clamp at the root otherwise.
                match parts.last() {
                    Some(&last) if last != ".." && !(has_drive && parts.len() == 1) => {
                        parts.pop();
                    }
                    _ if absolute || has_drive => {}
                    _ => parts.push(".."),
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
