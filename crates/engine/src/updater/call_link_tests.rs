// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{DateTime, Utc};
use yare::parameterized;

fn root_key() -> ByteKey {
    ByteKey::new(vec![3; 16])
}

fn deleted_at() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

#[test]
fn build_then_merge_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let mut link = CallLink::new(root_key());
    link.admin_passkey = Some(ByteKey::new(vec![8; 8]));
    db.upsert_call_link(&link).unwrap();

    let record = CallLinkUpdater
        .build_record(&db, &root_key(), None)
        .unwrap()
        .unwrap();
    let result = CallLinkUpdater.merge_record(&db, &record).unwrap();

    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: false,
            id: root_key(),
            affected: vec![]
        }
    );
    assert_eq!(db.get_call_link(&root_key()).unwrap(), Some(link));
}

#[test]
fn local_deletion_wins() {
    let db = Database::open_in_memory().unwrap();
    let mut link = CallLink::new(root_key());
    link.deleted_at = Some(deleted_at());
    db.upsert_call_link(&link).unwrap();

    let record = CallLinkRecord {
        root_key: root_key(),
        admin_passkey: Some(ByteKey::new(vec![8; 8])),
        ..Default::default()
    };
    let result = CallLinkUpdater.merge_record(&db, &record).unwrap();

    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: true,
            id: root_key(),
            affected: vec![]
        }
    );
    assert_eq!(db.get_call_link(&root_key()).unwrap(), Some(link));
}

#[test]
fn remote_deletion_is_applied() {
    let db = Database::open_in_memory().unwrap();
    db.upsert_call_link(&CallLink::new(root_key())).unwrap();

    let record = CallLinkRecord {
        root_key: root_key(),
        deleted_at_timestamp: Some(deleted_at().timestamp_millis()),
        ..Default::default()
    };
    CallLinkUpdater.merge_record(&db, &record).unwrap();
    let link = db.get_call_link(&root_key()).unwrap().unwrap();
    assert_eq!(link.deleted_at, Some(deleted_at()));
}

#[test]
fn wrong_length_root_key_is_invalid() {
    let db = Database::open_in_memory().unwrap();
    let record = CallLinkRecord {
        root_key: ByteKey::new(vec![3; 32]),
        ..Default::default()
    };
    assert_eq!(CallLinkUpdater.merge_record(&db, &record).unwrap(), MergeResult::Invalid);
}

#[parameterized(
    admin = { true, false, true },
    admin_deleted = { true, true, false },
    not_admin = { false, false, false },
)]
fn orphan_rules(admin: bool, deleted: bool, expected: bool) {
    let db = Database::open_in_memory().unwrap();
    let mut link = CallLink::new(root_key());
    if admin {
        link.admin_passkey = Some(ByteKey::new(vec![8; 8]));
    }
    if deleted {
        link.deleted_at = Some(deleted_at());
    }
    db.upsert_call_link(&link).unwrap();
    assert_eq!(CallLinkUpdater.should_restore_orphan(&db, &root_key()).unwrap(), expected);
}
