// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Accessors from a record updater to its slice of [`SyncState`].
//!
//! Two shapes: [`SingleElement`] for the one local-account entry and
//! [`Keyed`] for the tables keyed by local id.

use ss_core::{AccountRecord, ChangeState, EntityTable, StorageIdentifier, SyncState};

/// Read and write one record type's bookkeeping in the sync state.
pub trait StateAccess<Id, R>: Send + Sync {
    fn identifier(&self, state: &SyncState, id: &Id) -> Option<StorageIdentifier>;

    fn set_identifier(&self, state: &mut SyncState, id: &Id, identifier: Option<StorageIdentifier>);

    fn set_change(&self, state: &mut SyncState, id: &Id, change: ChangeState);

    fn record_with_unknown_fields(&self, state: &SyncState, id: &Id) -> Option<R>;

    fn set_record_with_unknown_fields(&self, state: &mut SyncState, id: &Id, record: Option<R>);

    /// Ids with a pending change. Every change state is reset.
    fn take_pending(&self, state: &mut SyncState) -> Vec<Id>;

    fn records_with_unknown_fields(&self, state: &SyncState) -> Vec<(Id, R)>;

    fn identifiers(&self, state: &SyncState) -> Vec<(Id, StorageIdentifier)>;
}

/// The local account entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleElement;

impl StateAccess<(), AccountRecord> for SingleElement {
    fn identifier(&self, state: &SyncState, _id: &()) -> Option<StorageIdentifier> {
        state.account.identifier.clone()
    }

    fn set_identifier(&self, state: &mut SyncState, _id: &(), identifier: Option<StorageIdentifier>) {
        state.account.identifier = identifier;
    }

    fn set_change(&self, state: &mut SyncState, _id: &(), change: ChangeState) {
        state.account.change = change;
    }

    fn record_with_unknown_fields(&self, state: &SyncState, _id: &()) -> Option<AccountRecord> {
        state.account.record_with_unknown_fields.clone()
    }

    fn set_record_with_unknown_fields(
        &self,
        state: &mut SyncState,
        _id: &(),
        record: Option<AccountRecord>,
    ) {
        state.account.record_with_unknown_fields = record;
    }

    fn take_pending(&self, state: &mut SyncState) -> Vec<()> {
        let pending = state.account.change.is_pending();
        state.account.change = ChangeState::Unchanged;
        if pending {
            vec![()]
        } else {
            Vec::new()
        }
    }

    fn records_with_unknown_fields(&self, state: &SyncState) -> Vec<((), AccountRecord)> {
        state
            .account
            .record_with_unknown_fields
            .iter()
            .map(|record| ((), record.clone()))
            .collect()
    }

    fn identifiers(&self, state: &SyncState) -> Vec<((), StorageIdentifier)> {
        state
            .account
            .identifier
            .iter()
            .map(|identifier| ((), identifier.clone()))
            .collect()
    }
}

/// One [`EntityTable`] of the sync state.
pub struct Keyed<K, R> {
    get: fn(&SyncState) -> &EntityTable<K, R>,
    get_mut: fn(&mut SyncState) -> &mut EntityTable<K, R>,
}

impl<K, R> Keyed<K, R> {
    pub fn new(
        get: fn(&SyncState) -> &EntityTable<K, R>,
        get_mut: fn(&mut SyncState) -> &mut EntityTable<K, R>,
    ) -> Self {
        Keyed { get, get_mut }
    }
}

impl<K, R> StateAccess<K, R> for Keyed<K, R>
where
    K: Ord + Clone + Send + Sync,
    R: Clone + Send + Sync,
{
    fn identifier(&self, state: &SyncState, id: &K) -> Option<StorageIdentifier> {
        (self.get)(state).identifiers.get(id).cloned()
    }

    fn set_identifier(&self, state: &mut SyncState, id: &K, identifier: Option<StorageIdentifier>) {
        let table = (self.get_mut)(state);
        match identifier {
            Some(identifier) => {
                table.identifiers.insert(id.clone(), identifier);
            }
            None => {
                table.identifiers.remove(id);
            }
        }
    }

    fn set_change(&self, state: &mut SyncState, id: &K, change: ChangeState) {
        let table = (self.get_mut)(state);
        if change.is_pending() {
            table.changes.insert(id.clone(), change);
        } else {
            table.changes.remove(id);
        }
    }

    fn record_with_unknown_fields(&self, state: &SyncState, id: &K) -> Option<R> {
        (self.get)(state).records_with_unknown_fields.get(id).cloned()
    }

    fn set_record_with_unknown_fields(&self, state: &mut SyncState, id: &K, record: Option<R>) {
        let table = (self.get_mut)(state);
        match record {
            Some(record) => {
                table.records_with_unknown_fields.insert(id.clone(), record);
            }
            None => {
                table.records_with_unknown_fields.remove(id);
            }
        }
    }

    fn take_pending(&self, state: &mut SyncState) -> Vec<K> {
        let table = (self.get_mut)(state);
        let pending = table.pending();
        table.changes.clear();
        pending
    }

    fn records_with_unknown_fields(&self, state: &SyncState) -> Vec<(K, R)> {
        (self.get)(state)
            .records_with_unknown_fields
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    fn identifiers(&self, state: &SyncState) -> Vec<(K, StorageIdentifier)> {
        (self.get)(state)
            .identifiers
            .iter()
            .map(|(id, identifier)| (id.clone(), identifier.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
