// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::identifier::{ByteKey, RecordType, StorageIdentifier};
use crate::state::ChangeState;
use tempfile::TempDir;

#[test]
fn open_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("local.db");
    let db = Database::open(&path).unwrap();
    db.kv_set("c", "k", &1u32).unwrap();
    assert!(path.exists());
}

#[test]
fn reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.db");
    {
        let db = Database::open(&path).unwrap();
        db.kv_set("c", "k", "value").unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.kv_get::<String>("c", "k").unwrap().as_deref(), Some("value"));
}

#[test]
fn kv_set_overwrites_and_remove_reports_presence() {
    let db = Database::open_in_memory().unwrap();
    db.kv_set("c", "k", &1u32).unwrap();
    db.kv_set("c", "k", &2u32).unwrap();
    assert_eq!(db.kv_get::<u32>("c", "k").unwrap(), Some(2));

    assert!(db.kv_remove("c", "k").unwrap());
    assert!(!db.kv_remove("c", "k").unwrap());
    assert_eq!(db.kv_get::<u32>("c", "k").unwrap(), None);
}

#[test]
fn missing_sync_state_is_default() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.load_sync_state().unwrap(), SyncState::default());
}

#[test]
fn sync_state_save_and_load() {
    let db = Database::open_in_memory().unwrap();
    let mut state = SyncState {
        manifest_version: 12,
        ..Default::default()
    };
    state.contacts.identifiers.insert(
        "r-1".into(),
        StorageIdentifier::new(ByteKey::new(vec![1; 16]), RecordType::Contact),
    );
    state.contacts.mark_updated("r-1".into());
    db.save_sync_state(&state).unwrap();

    let loaded = db.load_sync_state().unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.contacts.change(&"r-1".to_string()), ChangeState::Updated);
}

#[test]
fn undecodable_sync_state_resets() {
    let db = Database::open_in_memory().unwrap();
    db.conn
        .execute(
            "INSERT INTO kv (collection, key, value) VALUES (?1, 'sync_state', '{\"manifest_version\": \"x\"}')",
            [SYNC_COLLECTION],
        )
        .unwrap();
    assert_eq!(db.load_sync_state().unwrap(), SyncState::default());
}

#[test]
fn reset_sync_state_removes_blob() {
    let db = Database::open_in_memory().unwrap();
    let state = SyncState {
        manifest_version: 3,
        ..Default::default()
    };
    db.save_sync_state(&state).unwrap();
    db.reset_sync_state().unwrap();
    assert_eq!(db.load_sync_state().unwrap().manifest_version, 0);
}

#[test]
fn transaction_rolls_back_on_error() {
    let db = Database::open_in_memory().unwrap();
    let result: Result<()> = db.transaction(|db| {
        db.kv_set("c", "k", &1u32)?;
        Err(Error::InvalidInput("abort".into()))
    });
    assert!(result.is_err());
    assert_eq!(db.kv_get::<u32>("c", "k").unwrap(), None);

    db.transaction(|db| db.kv_set("c", "k", &5u32)).unwrap();
    assert_eq!(db.kv_get::<u32>("c", "k").unwrap(), Some(5));
}

#[test]
fn migration_bookkeeping_defaults() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.migration_version().unwrap(), 0);
    assert!(db.completed_migrations().unwrap().is_empty());

    db.set_migration_version(1).unwrap();
    db.set_completed_migrations(&["a".to_string()]).unwrap();
    assert_eq!(db.migration_version().unwrap(), 1);
    assert_eq!(db.completed_migrations().unwrap(), vec!["a".to_string()]);
}
