// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Counting {
    id: &'static str,
    runs: AtomicUsize,
    seen: AtomicUsize,
}

impl Counting {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Counting {
            id,
            runs: AtomicUsize::new(0),
            seen: AtomicUsize::new(0),
        })
    }
}

impl UnknownFieldMigration for Counting {
    fn id(&self) -> &str {
        self.id
    }

    fn run(&self, records: &[Record], _db: &Database) -> ss_core::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen.fetch_add(records.len(), Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn migrations_run_once() {
    let db = Database::open_in_memory().unwrap();
    let first = Counting::new("first");
    let migrations: Vec<Arc<dyn UnknownFieldMigration>> = vec![first.clone()];
    let records = vec![Record::GroupV2(Default::default())];

    assert!(has_pending(&migrations, &db).unwrap());
    assert_eq!(run_pending(&migrations, &records, &db).unwrap(), vec!["first"]);
    assert!(!has_pending(&migrations, &db).unwrap());
    assert!(run_pending(&migrations, &records, &db).unwrap().is_empty());

    assert_eq!(first.runs.load(Ordering::SeqCst), 1);
    assert_eq!(first.seen.load(Ordering::SeqCst), 1);
    assert_eq!(db.completed_migrations().unwrap(), vec!["first"]);
}

#[test]
fn new_migration_runs_after_old_ones() {
    let db = Database::open_in_memory().unwrap();
    db.set_completed_migrations(&["first".to_string()]).unwrap();
    let first = Counting::new("first");
    let second = Counting::new("second");
    let migrations: Vec<Arc<dyn UnknownFieldMigration>> = vec![first.clone(), second.clone()];

    assert_eq!(run_pending(&migrations, &[], &db).unwrap(), vec!["second"]);
    assert_eq!(first.runs.load(Ordering::SeqCst), 0);
    assert_eq!(second.runs.load(Ordering::SeqCst), 1);
    assert_eq!(db.completed_migrations().unwrap(), vec!["first", "second"]);
}

#[test]
fn no_migrations_is_never_pending() {
    let db = Database::open_in_memory().unwrap();
    assert!(!has_pending(&[], &db).unwrap());
}
