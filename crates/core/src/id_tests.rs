// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::mission::MissionId;
use crate::specialist::SpecialistId;

#[test]
fn generated_ids_carry_prefix() {
    let id = MissionId::new();
    assert!(id.as_str().starts_with("msn-"));
    assert_eq!(id.as_str().len(), 23);
}

#[test]
fn generated_ids_are_unique() {
    let a = SpecialistId::new();
    let b = SpecialistId::new();
    assert_ne!(a, b);
}

#[test]
fn suffix_strips_prefix() {
    let id = MissionId::from_string("msn-abc123");
    assert_eq!(id.suffix(), "abc123");
    assert_eq!(id.short(3), "abc");
}

#[test]
fn suffix_of_foreign_string_is_identity() {
    let id = MissionId::from_string("no-prefix-here");
    assert_eq!(id.suffix(), "no-prefix-here");
}

#[test]
fn serde_is_transparent() {
    let id = MissionId::from_string("msn-x");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"msn-x\"");
    let back: MissionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn compares_against_str() {
    let id = MissionId::from_string("msn-x");
    assert_eq!(id, "msn-x");
    assert_eq!(&id.to_string(), "msn-x");
}

#[test]
fn short_helper_truncates() {
    assert_eq!(super::short("abcdef", 3), "abc");
    assert_eq!(super::short("ab", 3), "ab");
}
