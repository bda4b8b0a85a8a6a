// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted sync state.
//!
//! [`SyncState`] is the single aggregate the sync engine loads at the start
//! of every operation and saves at the end. It maps each local entity to its
//! live storage identifier, tracks which entities have pending changes and
//! keeps records that carried fields this build could not parse.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::identifier::{ByteKey, RecordType, StorageIdentifier};
use crate::legacy::deserialize_identifier_map;
use crate::record::{
    AccountRecord, CallLinkRecord, ContactRecord, GroupV1Record, GroupV2Record,
    StoryDistributionListRecord,
};

/// Pending-change marker for one local entity.
///
/// Stored as an integer. `Deleted` only exists so state written by old
/// builds still decodes; it is treated like `Updated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChangeState {
    #[default]
    Unchanged,
    Updated,
    Deleted,
}

impl ChangeState {
    pub fn is_pending(&self) -> bool {
        !matches!(self, ChangeState::Unchanged)
    }
}

impl TryFrom<u8> for ChangeState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChangeState::Unchanged),
            1 => Ok(ChangeState::Updated),
            2 => Ok(ChangeState::Deleted),
            other => Err(Error::CorruptedData(format!("invalid change state {other}"))),
        }
    }
}

impl From<ChangeState> for u8 {
    fn from(value: ChangeState) -> Self {
        match value {
            ChangeState::Unchanged => 0,
            ChangeState::Updated => 1,
            ChangeState::Deleted => 2,
        }
    }
}

/// Sync bookkeeping for the singleton local account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountEntry {
    pub identifier: Option<StorageIdentifier>,
    pub change: ChangeState,
    pub record_with_unknown_fields: Option<AccountRecord>,
}

/// Sync bookkeeping for one keyed entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize, R: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, R: Deserialize<'de>"
))]
pub struct EntityTable<K, R> {
    #[serde(default, deserialize_with = "deserialize_identifier_map")]
    pub identifiers: BTreeMap<K, StorageIdentifier>,
    #[serde(default)]
    pub changes: BTreeMap<K, ChangeState>,
    #[serde(default)]
    pub records_with_unknown_fields: BTreeMap<K, R>,
}

impl<K, R> Default for EntityTable<K, R> {
    fn default() -> Self {
        EntityTable {
            identifiers: BTreeMap::new(),
            changes: BTreeMap::new(),
            records_with_unknown_fields: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, R> EntityTable<K, R> {
    pub fn mark_updated(&mut self, id: K) {
        self.changes.insert(id, ChangeState::Updated);
    }

    /// Ids with a pending change.
    pub fn pending(&self) -> Vec<K> {
        self.changes
            .iter()
            .filter(|(_, change)| change.is_pending())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn change(&self, id: &K) -> ChangeState {
        self.changes.get(id).copied().unwrap_or_default()
    }

    /// Finds the local id holding an identifier.
    pub fn local_id(&self, identifier: &StorageIdentifier) -> Option<K> {
        self.identifiers
            .iter()
            .find(|(_, value)| *value == identifier)
            .map(|(id, _)| id.clone())
    }

    /// Drops every trace of a local id.
    pub fn forget(&mut self, id: &K) {
        self.identifiers.remove(id);
        self.changes.remove(id);
        self.records_with_unknown_fields.remove(id);
    }
}

/// The persisted sync aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    /// Last manifest version this device reconciled against.
    pub manifest_version: u64,
    /// Forces the next restore to fetch the manifest unconditionally.
    pub refetch_latest_manifest: bool,
    pub consecutive_conflicts: u32,
    pub account: AccountEntry,
    /// Keyed by recipient unique id.
    pub contacts: EntityTable<String, ContactRecord>,
    /// Keyed by 16-byte group id.
    pub groups_v1: EntityTable<ByteKey, GroupV1Record>,
    /// Keyed by 32-byte master key.
    pub groups_v2: EntityTable<ByteKey, GroupV2Record>,
    pub distribution_lists: EntityTable<ByteKey, StoryDistributionListRecord>,
    /// Keyed by call link root key.
    pub call_links: EntityTable<ByteKey, CallLinkRecord>,
    /// Identifiers of types this build could not parse when last seen.
    pub unknown_identifiers: BTreeMap<RecordType, Vec<StorageIdentifier>>,
    /// Identifiers to delete with the next manifest write.
    pub invalid_identifiers: BTreeSet<StorageIdentifier>,
    pub unknown_field_last_checked_app_version: Option<String>,
}

impl SyncState {
    /// Every identifier this device believes is live.
    pub fn all_identifiers(&self) -> BTreeSet<StorageIdentifier> {
        let mut all = BTreeSet::new();
        all.extend(self.account.identifier.iter().cloned());
        all.extend(self.contacts.identifiers.values().cloned());
        all.extend(self.groups_v1.identifiers.values().cloned());
        all.extend(self.groups_v2.identifiers.values().cloned());
        all.extend(self.distribution_lists.identifiers.values().cloned());
        all.extend(self.call_links.identifiers.values().cloned());
        all.extend(self.unknown_identifiers.values().flatten().cloned());
        all
    }

    pub fn unknown_identifier_count(&self) -> usize {
        self.unknown_identifiers.values().map(Vec::len).sum()
    }

    /// True if any entity has a pending change.
    pub fn has_pending_changes(&self) -> bool {
        self.account.change.is_pending()
            || !self.contacts.pending().is_empty()
            || !self.groups_v1.pending().is_empty()
            || !self.groups_v2.pending().is_empty()
            || !self.distribution_lists.pending().is_empty()
            || !self.call_links.pending().is_empty()
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
