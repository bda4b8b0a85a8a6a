// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{DateTime, Utc};
use ss_core::local::MY_STORY_ID;

fn list_id(byte: u8) -> ByteKey {
    ByteKey::new(vec![byte; 16])
}

fn deleted_at() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

#[test]
fn build_then_merge_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let mut list = DistributionList::new(list_id(1), "Close friends");
    list.members = vec!["aci-a".into(), "aci-b".into()];
    list.allows_replies = false;
    db.upsert_distribution_list(&list).unwrap();

    let record = DistributionListUpdater
        .build_record(&db, &list_id(1), None)
        .unwrap()
        .unwrap();
    let result = DistributionListUpdater.merge_record(&db, &record).unwrap();

    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: false,
            id: list_id(1),
            affected: vec![]
        }
    );
    assert_eq!(db.get_distribution_list(&list_id(1)).unwrap(), Some(list));
}

#[test]
fn remote_deletion_is_applied() {
    let db = Database::open_in_memory().unwrap();
    let mut list = DistributionList::new(list_id(2), "Work");
    list.members = vec!["aci-a".into()];
    db.upsert_distribution_list(&list).unwrap();

    let record = StoryDistributionListRecord {
        identifier: list_id(2),
        name: "Work".into(),
        deleted_at_timestamp: Some(deleted_at().timestamp_millis()),
        ..Default::default()
    };
    DistributionListUpdater.merge_record(&db, &record).unwrap();

    let list = db.get_distribution_list(&list_id(2)).unwrap().unwrap();
    assert_eq!(list.deleted_at, Some(deleted_at()));
    assert!(list.members.is_empty());
}

#[test]
fn my_story_deletion_is_refused() {
    let db = Database::open_in_memory().unwrap();
    let my_story = ByteKey::new(MY_STORY_ID.to_vec());
    db.upsert_distribution_list(&DistributionList::new(my_story.clone(), "My Story"))
        .unwrap();

    let record = StoryDistributionListRecord {
        identifier: my_story.clone(),
        deleted_at_timestamp: Some(deleted_at().timestamp_millis()),
        ..Default::default()
    };
    let result = DistributionListUpdater.merge_record(&db, &record).unwrap();

    assert_eq!(
        result,
        MergeResult::Merged {
            needs_update: true,
            id: my_story.clone(),
            affected: vec![]
        }
    );
    let list = db.get_distribution_list(&my_story).unwrap().unwrap();
    assert_eq!(list.deleted_at, None);
    assert_eq!(list.name, "My Story");
}

#[test]
fn short_identifier_is_invalid() {
    let db = Database::open_in_memory().unwrap();
    let record = StoryDistributionListRecord {
        identifier: ByteKey::new(vec![1; 8]),
        ..Default::default()
    };
    assert_eq!(
        DistributionListUpdater.merge_record(&db, &record).unwrap(),
        MergeResult::Invalid
    );
}

#[test]
fn deleted_lists_are_still_built() {
    let db = Database::open_in_memory().unwrap();
    let mut list = DistributionList::new(list_id(3), "Old");
    list.deleted_at = Some(deleted_at());
    db.upsert_distribution_list(&list).unwrap();

    let record = DistributionListUpdater
        .build_record(&db, &list_id(3), None)
        .unwrap()
        .unwrap();
    assert_eq!(record.deleted_at_timestamp, Some(deleted_at().timestamp_millis()));
    assert!(DistributionListUpdater
        .should_restore_orphan(&db, &list_id(3))
        .unwrap());
}
