// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Record updaters.
//!
//! A [`RecordUpdater`] knows how to build one record type from local data
//! and how to merge a remote record back into it. [`Handler`] pairs an
//! updater with the [`StateAccess`] for its slice of the sync state and
//! exposes the result as an object-safe [`KindHandler`], so operations can
//! walk every record type through one table.

pub mod account;
pub mod call_link;
pub mod contact;
pub mod distribution_list;
pub mod group_v1;
pub mod group_v2;
pub mod state;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ss_core::{
    ChangeState, Database, LocalAccount, Record, RecordType, StorageIdentifier, StorageItem,
    SyncState, UnknownFields,
};

use crate::config::SyncConfig;

pub use self::account::AccountUpdater;
pub use self::call_link::CallLinkUpdater;
pub use self::contact::ContactUpdater;
pub use self::distribution_list::DistributionListUpdater;
pub use self::group_v1::GroupV1Updater;
pub use self::group_v2::GroupV2Updater;
pub use self::state::{Keyed, SingleElement, StateAccess};

/// Outcome of merging one remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult<Id> {
    /// The record cannot be applied and its identifier should be dropped.
    Invalid,
    /// The record was applied to the local entity `id`. `needs_update` is
    /// set when local data is newer and must be written back. `affected`
    /// lists other local entities the merge changed; their records are
    /// stale and must be rebuilt.
    Merged {
        needs_update: bool,
        id: Id,
        affected: Vec<Id>,
    },
}

/// The local account's own identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentifiers {
    pub aci: String,
    pub pni: Option<String>,
    pub e164: Option<String>,
}

impl LocalIdentifiers {
    pub fn new(aci: impl Into<String>) -> Self {
        LocalIdentifiers {
            aci: aci.into(),
            pni: None,
            e164: None,
        }
    }

    /// Whether any of `aci`, `pni` or `e164` names this account.
    pub fn contains_any(&self, aci: Option<&str>, pni: Option<&str>, e164: Option<&str>) -> bool {
        aci.is_some_and(|aci| aci == self.aci)
            || pni.is_some_and(|pni| self.pni.as_deref() == Some(pni))
            || e164.is_some_and(|e164| self.e164.as_deref() == Some(e164))
    }
}

impl From<&LocalAccount> for LocalIdentifiers {
    fn from(account: &LocalAccount) -> Self {
        LocalIdentifiers {
            aci: account.aci.clone(),
            pni: account.pni.clone(),
            e164: account.e164.clone(),
        }
    }
}

/// Type-specific build and merge rules for one record type.
pub trait RecordUpdater: Send + Sync {
    type Id: Ord + Clone + std::fmt::Debug + Send + Sync;
    type Record: Clone + Send + Sync;

    fn record_type(&self) -> RecordType;

    /// Every local entity that belongs in a freshly created manifest.
    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<Self::Id>>;

    /// Build the record for a local entity, carrying over fields a previous
    /// record had that this build does not understand. `None` means the
    /// entity no longer belongs in the storage service.
    fn build_record(
        &self,
        db: &Database,
        id: &Self::Id,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<Self::Record>>;

    fn merge_record(
        &self,
        db: &Database,
        record: &Self::Record,
    ) -> ss_core::Result<MergeResult<Self::Id>>;

    fn unknown_fields<'r>(&self, record: &'r Self::Record) -> Option<&'r UnknownFields>;

    fn into_record(&self, record: Self::Record) -> Record;

    fn from_record(&self, record: &Record) -> Option<Self::Record>;

    /// Records to merge in the second pass, after identity merges settle.
    fn should_defer(&self, _record: &Self::Record) -> bool {
        false
    }

    /// Whether an entity whose identifier vanished from the manifest
    /// should be written back.
    fn should_restore_orphan(&self, _db: &Database, _id: &Self::Id) -> ss_core::Result<bool> {
        Ok(true)
    }
}

/// New records and superseded identifiers gathered for a push.
#[derive(Debug, Default)]
pub struct PendingChanges {
    pub items: Vec<StorageItem>,
    pub deleted: Vec<StorageIdentifier>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.deleted.is_empty()
    }
}

/// Object-safe view of one record type, used by the sync operations.
pub trait KindHandler: Send + Sync {
    fn record_type(&self) -> RecordType;

    /// Build records for every pending entity and reset its change state.
    fn collect_changes(
        &self,
        db: &Database,
        state: &mut SyncState,
        changes: &mut PendingChanges,
    ) -> ss_core::Result<()>;

    /// Build records for every local entity, for a new manifest.
    fn create_all(
        &self,
        db: &Database,
        state: &mut SyncState,
        items: &mut Vec<StorageItem>,
    ) -> ss_core::Result<()>;

    /// Merge a remote record. Returns false when the record was invalid.
    fn merge(
        &self,
        db: &Database,
        state: &mut SyncState,
        identifier: &StorageIdentifier,
        record: &Record,
    ) -> ss_core::Result<bool>;

    fn should_defer(&self, record: &Record) -> bool;

    /// Mark entities whose identifier is missing from `manifest` as
    /// updated, where the record type's rules allow it; the others lose
    /// their identifier. Returns how many were marked.
    fn restore_orphans(
        &self,
        db: &Database,
        state: &mut SyncState,
        manifest: &BTreeSet<StorageIdentifier>,
    ) -> ss_core::Result<usize>;

    /// Cached records that carry unknown fields.
    fn records_with_unknown_fields(&self, state: &SyncState) -> Vec<Record>;

    /// Merge the cached unknown-field records again. Returns how many
    /// records still carry unknown fields afterwards.
    fn remerge_unknown_fields(&self, db: &Database, state: &mut SyncState)
        -> ss_core::Result<usize>;
}

/// A [`RecordUpdater`] bound to its slice of the sync state.
pub struct Handler<U, S> {
    updater: U,
    access: S,
}

impl<U, S> Handler<U, S>
where
    U: RecordUpdater,
    S: StateAccess<U::Id, U::Record>,
{
    pub fn new(updater: U, access: S) -> Self {
        Handler { updater, access }
    }

    fn merge_typed(
        &self,
        db: &Database,
        state: &mut SyncState,
        identifier: &StorageIdentifier,
        record: U::Record,
    ) -> ss_core::Result<bool> {
        match self.updater.merge_record(db, &record)? {
            MergeResult::Invalid => {
                tracing::debug!(identifier = %identifier, "invalid record");
                Ok(false)
            }
            MergeResult::Merged {
                needs_update,
                id,
                affected,
            } => {
                self.access
                    .set_identifier(state, &id, Some(identifier.clone()));
                let change = if needs_update {
                    ChangeState::Updated
                } else {
                    ChangeState::Unchanged
                };
                self.access.set_change(state, &id, change);
                let keep = self.updater.unknown_fields(&record).is_some();
                self.access
                    .set_record_with_unknown_fields(state, &id, keep.then_some(record));
                for other in affected.iter().filter(|other| **other != id) {
                    self.access.set_change(state, other, ChangeState::Updated);
                }
                Ok(true)
            }
        }
    }
}

impl<U, S> KindHandler for Handler<U, S>
where
    U: RecordUpdater,
    S: StateAccess<U::Id, U::Record>,
{
    fn record_type(&self) -> RecordType {
        self.updater.record_type()
    }

    fn collect_changes(
        &self,
        db: &Database,
        state: &mut SyncState,
        changes: &mut PendingChanges,
    ) -> ss_core::Result<()> {
        for id in self.access.take_pending(state) {
            let previous = self.access.record_with_unknown_fields(state, &id);
            let unknown = previous
                .as_ref()
                .and_then(|r| self.updater.unknown_fields(r));
            let record = self.updater.build_record(db, &id, unknown)?;

            // Every change gets a fresh identifier, so the old one always goes.
            if let Some(old) = self.access.identifier(state, &id) {
                changes.deleted.push(old);
            }
            self.access.set_identifier(state, &id, None);
            self.access.set_record_with_unknown_fields(state, &id, None);

            let Some(record) = record else {
                continue;
            };
            if self.updater.unknown_fields(&record).is_some() {
                self.access
                    .set_record_with_unknown_fields(state, &id, Some(record.clone()));
            }
            let item = StorageItem::generate(self.updater.into_record(record))?;
            self.access
                .set_identifier(state, &id, Some(item.identifier.clone()));
            changes.items.push(item);
        }
        Ok(())
    }

    fn create_all(
        &self,
        db: &Database,
        state: &mut SyncState,
        items: &mut Vec<StorageItem>,
    ) -> ss_core::Result<()> {
        for id in self.updater.local_ids(db)? {
            let Some(record) = self.updater.build_record(db, &id, None)? else {
                continue;
            };
            let item = StorageItem::generate(self.updater.into_record(record))?;
            self.access
                .set_identifier(state, &id, Some(item.identifier.clone()));
            items.push(item);
        }
        Ok(())
    }

    fn merge(
        &self,
        db: &Database,
        state: &mut SyncState,
        identifier: &StorageIdentifier,
        record: &Record,
    ) -> ss_core::Result<bool> {
        let Some(record) = self.updater.from_record(record) else {
            tracing::warn!(identifier = %identifier, "record does not match its identifier type");
            return Ok(false);
        };
        self.merge_typed(db, state, identifier, record)
    }

    fn should_defer(&self, record: &Record) -> bool {
        self.updater
            .from_record(record)
            .is_some_and(|r| self.updater.should_defer(&r))
    }

    fn restore_orphans(
        &self,
        db: &Database,
        state: &mut SyncState,
        manifest: &BTreeSet<StorageIdentifier>,
    ) -> ss_core::Result<usize> {
        let mut count = 0;
        for (id, identifier) in self.access.identifiers(state) {
            if manifest.contains(&identifier) {
                continue;
            }
            if self.updater.should_restore_orphan(db, &id)? {
                self.access.set_change(state, &id, ChangeState::Updated);
                count += 1;
            } else {
                self.access.set_identifier(state, &id, None);
                self.access.set_record_with_unknown_fields(state, &id, None);
            }
        }
        Ok(count)
    }

    fn records_with_unknown_fields(&self, state: &SyncState) -> Vec<Record> {
        self.access
            .records_with_unknown_fields(state)
            .into_iter()
            .map(|(_, record)| self.updater.into_record(record))
            .collect()
    }

    fn remerge_unknown_fields(
        &self,
        db: &Database,
        state: &mut SyncState,
    ) -> ss_core::Result<usize> {
        let records = self.access.records_with_unknown_fields(state);
        if records.is_empty() {
            return Ok(0);
        }
        for (id, record) in &records {
            let Some(identifier) = self.access.identifier(state, id) else {
                tracing::warn!(record_type = %self.record_type(), ?id, "unknown fields without identifier");
                self.access.set_record_with_unknown_fields(state, id, None);
                continue;
            };
            self.merge_typed(db, state, &identifier, record.clone())?;
        }
        let remaining = self.access.records_with_unknown_fields(state).len();
        tracing::info!(
            record_type = %self.record_type(),
            resolved = records.len().saturating_sub(remaining),
            remaining,
            "re-merged records with unknown fields"
        );
        Ok(remaining)
    }
}

/// The handler table, in processing order: account first.
pub struct Handlers {
    handlers: Vec<Box<dyn KindHandler>>,
}

impl Handlers {
    pub fn new(local: &LocalIdentifiers, config: &SyncConfig, now: DateTime<Utc>) -> Self {
        let mut handlers: Vec<Box<dyn KindHandler>> = vec![
            Box::new(Handler::new(AccountUpdater::new(local.clone()), SingleElement)),
            Box::new(Handler::new(
                ContactUpdater::new(local.clone(), now),
                Keyed::new(|s| &s.contacts, |s| &mut s.contacts),
            )),
            Box::new(Handler::new(
                GroupV1Updater,
                Keyed::new(|s| &s.groups_v1, |s| &mut s.groups_v1),
            )),
            Box::new(Handler::new(
                GroupV2Updater,
                Keyed::new(|s| &s.groups_v2, |s| &mut s.groups_v2),
            )),
            Box::new(Handler::new(
                DistributionListUpdater,
                Keyed::new(|s| &s.distribution_lists, |s| &mut s.distribution_lists),
            )),
        ];
        if config.call_link_sync {
            handlers.push(Box::new(Handler::new(
                CallLinkUpdater,
                Keyed::new(|s| &s.call_links, |s| &mut s.call_links),
            )));
        }
        Handlers { handlers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn KindHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn get(&self, record_type: RecordType) -> Option<&dyn KindHandler> {
        self.iter().find(|h| h.record_type() == record_type)
    }

    /// Whether this build can parse records of a type.
    pub fn is_known(&self, record_type: RecordType) -> bool {
        self.get(record_type).is_some()
    }
}

/// Convert an optional millisecond timestamp.
pub(crate) fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|at| at.timestamp_millis())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
