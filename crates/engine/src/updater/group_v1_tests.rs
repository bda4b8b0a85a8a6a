// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn merge_then_build_round_trips() {
    let db = Database::open_in_memory().unwrap();
    let record = GroupV1Record {
        id: ByteKey::new(vec![4; 16]),
        archived: true,
        ..Default::default()
    };
    let result = GroupV1Updater.merge_record(&db, &record).unwrap();
    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: false,
            id: record.id.clone(),
            affected: vec![]
        }
    );

    let built = GroupV1Updater
        .build_record(&db, &record.id, None)
        .unwrap()
        .unwrap();
    assert_eq!(built, record);
}

#[parameterized(
    empty = { 0 },
    short = { 15 },
    long = { 32 },
)]
fn wrong_length_id_is_invalid(len: usize) {
    let db = Database::open_in_memory().unwrap();
    let record = GroupV1Record {
        id: ByteKey::new(vec![1; len]),
        ..Default::default()
    };
    assert_eq!(GroupV1Updater.merge_record(&db, &record).unwrap(), MergeResult::Invalid);
    assert!(db.list_group_v1_ids().unwrap().is_empty());
}

#[test]
fn orphans_are_never_restored() {
    let db = Database::open_in_memory().unwrap();
    let id = ByteKey::new(vec![4; 16]);
    db.upsert_group_v1(&GroupV1::new(id.clone())).unwrap();
    assert!(!GroupV1Updater.should_restore_orphan(&db, &id).unwrap());
}

#[test]
fn fresh_manifests_leave_out_legacy_groups() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_group_v1(&GroupV1::new(ByteKey::new(vec![4; 16])))
        .unwrap();
    assert!(GroupV1Updater.local_ids(&db).unwrap().is_empty());
}
