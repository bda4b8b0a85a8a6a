// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;

fn setup() -> (Database, AccountUpdater) {
    let db = Database::open_in_memory().unwrap();
    let mut account = LocalAccount::new("aci-self");
    account.given_name = Some("Ada".into());
    account.family_name = Some("Lovelace".into());
    account.universal_expire_timer = 3600;
    db.set_local_account(&account).unwrap();
    (db, AccountUpdater::new(LocalIdentifiers::new("aci-self")))
}

#[test]
fn build_reflects_local_account() {
    let (db, updater) = setup();
    let record = updater.build_record(&db, &(), None).unwrap().unwrap();
    assert_eq!(record.given_name.as_deref(), Some("Ada"));
    assert_eq!(record.universal_expire_timer, 3600);
    assert!(record.read_receipts);
    assert!(updater.unknown_fields(&record).is_none());
}

#[test]
fn build_without_account_is_none() {
    let db = Database::open_in_memory().unwrap();
    let updater = AccountUpdater::new(LocalIdentifiers::new("aci-self"));
    assert!(updater.build_record(&db, &(), None).unwrap().is_none());
    assert!(updater.local_ids(&db).unwrap().is_empty());
}

#[test]
fn build_then_merge_is_idempotent() {
    let (db, updater) = setup();
    let record = updater.build_record(&db, &(), None).unwrap().unwrap();
    let before = db.get_local_account().unwrap();

    let result = updater.merge_record(&db, &record).unwrap();
    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: false,
            id: (),
            affected: vec![]
        }
    );
    assert_eq!(db.get_local_account().unwrap(), before);
}

#[test]
fn remote_settings_win() {
    let (db, updater) = setup();
    let record = AccountRecord {
        given_name: Some("Grace".into()),
        read_receipts: false,
        link_previews: false,
        universal_expire_timer: 60,
        ..Default::default()
    };
    updater.merge_record(&db, &record).unwrap();

    let account = db.get_local_account().unwrap().unwrap();
    assert_eq!(account.given_name.as_deref(), Some("Grace"));
    assert_eq!(account.family_name, None);
    assert!(!account.read_receipts);
    assert!(!account.link_previews);
    assert_eq!(account.universal_expire_timer, 60);
}

#[test]
fn missing_remote_profile_name_needs_update() {
    let (db, updater) = setup();
    let record = AccountRecord::default();
    let result = updater.merge_record(&db, &record).unwrap();
    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: true,
            id: (),
            affected: vec![]
        }
    );
    let account = db.get_local_account().unwrap().unwrap();
    assert_eq!(account.given_name.as_deref(), Some("Ada"));
}

#[test]
fn merge_creates_missing_local_account() {
    let db = Database::open_in_memory().unwrap();
    let updater = AccountUpdater::new(LocalIdentifiers::new("aci-new"));
    let record = AccountRecord {
        given_name: Some("Linus".into()),
        ..Default::default()
    };
    updater.merge_record(&db, &record).unwrap();
    let account = db.get_local_account().unwrap().unwrap();
    assert_eq!(account.aci, "aci-new");
    assert_eq!(account.given_name.as_deref(), Some("Linus"));
}

#[test]
fn unknown_fields_survive_rebuild() {
    let (db, updater) = setup();
    let remote: AccountRecord = serde_json::from_value(json!({
        "givenName": "Ada",
        "pinnedConversations": ["a", "b"],
    }))
    .unwrap();
    let unknown = updater.unknown_fields(&remote).unwrap();

    let rebuilt = updater.build_record(&db, &(), Some(unknown)).unwrap().unwrap();
    let value = serde_json::to_value(&rebuilt).unwrap();
    assert_eq!(value["pinnedConversations"], json!(["a", "b"]));
    assert_eq!(value["familyName"], json!("Lovelace"));
}

#[test]
fn account_orphans_are_not_restored_here() {
    let (db, updater) = setup();
    assert!(!updater.should_restore_orphan(&db, &()).unwrap());
}
