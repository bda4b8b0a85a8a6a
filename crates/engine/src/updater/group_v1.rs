// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy group records.
//!
//! Still merged so their flags reach this device, but never written back
//! when another device drops them and left out of newly created manifests.

use ss_core::{ByteKey, Database, GroupV1, GroupV1Record, Record, RecordType, UnknownFields};

use super::{MergeResult, RecordUpdater};

pub struct GroupV1Updater;

impl RecordUpdater for GroupV1Updater {
    type Id = ByteKey;
    type Record = GroupV1Record;

    fn record_type(&self) -> RecordType {
        RecordType::GroupV1
    }

    /// Legacy groups are never written into a fresh manifest.
    fn local_ids(&self, _db: &Database) -> ss_core::Result<Vec<ByteKey>> {
        Ok(Vec::new())
    }

    fn build_record(
        &self,
        db: &Database,
        id: &ByteKey,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<GroupV1Record>> {
        Ok(db.get_group_v1(id)?.map(|group| GroupV1Record {
            id: group.id,
            blocked: group.blocked,
            whitelisted: group.whitelisted,
            archived: group.archived,
            unknown: unknown.cloned().unwrap_or_default(),
        }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &GroupV1Record,
    ) -> ss_core::Result<MergeResult<ByteKey>> {
        if record.id.len() != GroupV1::ID_LEN {
            tracing::warn!(len = record.id.len(), "group v1 record with invalid id");
            return Ok(MergeResult::Invalid);
        }
        let mut group = db
            .get_group_v1(&record.id)?
            .unwrap_or_else(|| GroupV1::new(record.id.clone()));
        group.blocked = record.blocked;
        group.whitelisted = record.whitelisted;
        group.archived = record.archived;
        db.upsert_group_v1(&group)?;
        Ok(MergeResult::Merged {
            needs_update: false,
            id: group.id,
            affected: Vec::new(),
        })
    }

    fn unknown_fields<'r>(&self, record: &'r GroupV1Record) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: GroupV1Record) -> Record {
        Record::GroupV1(record)
    }

    fn from_record(&self, record: &Record) -> Option<GroupV1Record> {
        match record {
            Record::GroupV1(record) => Some(record.clone()),
            _ => None,
        }
    }

    fn should_restore_orphan(&self, _db: &Database, _id: &ByteKey) -> ss_core::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
#[path = "group_v1_tests.rs"]
mod tests;
