// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Call link records, keyed by root key.

use ss_core::{ByteKey, CallLink, CallLinkRecord, Database, Record, RecordType, UnknownFields};

use super::{from_millis, to_millis, MergeResult, RecordUpdater};

pub struct CallLinkUpdater;

impl RecordUpdater for CallLinkUpdater {
    type Id = ByteKey;
    type Record = CallLinkRecord;

    fn record_type(&self) -> RecordType {
        RecordType::CallLink
    }

    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<ByteKey>> {
        db.list_call_link_keys()
    }

    fn build_record(
        &self,
        db: &Database,
        id: &ByteKey,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<CallLinkRecord>> {
        Ok(db.get_call_link(id)?.map(|link| CallLinkRecord {
            root_key: link.root_key,
            admin_passkey: link.admin_passkey,
            deleted_at_timestamp: to_millis(link.deleted_at),
            unknown: unknown.cloned().unwrap_or_default(),
        }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &CallLinkRecord,
    ) -> ss_core::Result<MergeResult<ByteKey>> {
        if record.root_key.len() != CallLink::ROOT_KEY_LEN {
            tracing::warn!(len = record.root_key.len(), "call link with invalid root key");
            return Ok(MergeResult::Invalid);
        }
        let mut link = db
            .get_call_link(&record.root_key)?
            .unwrap_or_else(|| CallLink::new(record.root_key.clone()));

        let remote_deleted_at = from_millis(record.deleted_at_timestamp);
        // A local deletion beats a remote copy that still has the link.
        let needs_update = link.deleted_at.is_some() && remote_deleted_at.is_none();
        if !needs_update {
            if record.admin_passkey.is_some() {
                link.admin_passkey = record.admin_passkey.clone();
            }
            if remote_deleted_at.is_some() {
                link.deleted_at = remote_deleted_at;
            }
        }

        db.upsert_call_link(&link)?;
        Ok(MergeResult::Merged {
            needs_update,
            id: link.root_key,
            affected: Vec::new(),
        })
    }

    fn unknown_fields<'r>(&self, record: &'r CallLinkRecord) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: CallLinkRecord) -> Record {
        Record::CallLink(record)
    }

    fn from_record(&self, record: &Record) -> Option<CallLinkRecord> {
        match record {
            Record::CallLink(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// Another device may drop links this device does not administer, or
    /// links that are already deleted.
    fn should_restore_orphan(&self, db: &Database, id: &ByteKey) -> ss_core::Result<bool> {
        Ok(db
            .get_call_link(id)?
            .is_some_and(|link| link.is_admin() && link.deleted_at.is_none()))
    }
}

#[cfg(test)]
#[path = "call_link_tests.rs"]
mod tests;
