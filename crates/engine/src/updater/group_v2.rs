// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Group records, keyed by master key.

use ss_core::{ByteKey, Database, GroupV2, GroupV2Record, Record, RecordType, UnknownFields};

use super::{MergeResult, RecordUpdater};

pub struct GroupV2Updater;

impl RecordUpdater for GroupV2Updater {
    type Id = ByteKey;
    type Record = GroupV2Record;

    fn record_type(&self) -> RecordType {
        RecordType::GroupV2
    }

    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<ByteKey>> {
        db.list_group_v2_keys()
    }

    fn build_record(
        &self,
        db: &Database,
        id: &ByteKey,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<GroupV2Record>> {
        Ok(db.get_group_v2(id)?.map(|group| GroupV2Record {
            master_key: group.master_key,
            blocked: group.blocked,
            whitelisted: group.whitelisted,
            archived: group.archived,
            mark_unread: group.mark_unread,
            dont_notify_for_mentions: group.dont_notify_for_mentions,
            unknown: unknown.cloned().unwrap_or_default(),
        }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &GroupV2Record,
    ) -> ss_core::Result<MergeResult<ByteKey>> {
        if record.master_key.len() != GroupV2::MASTER_KEY_LEN {
            tracing::warn!(len = record.master_key.len(), "group v2 record with invalid master key");
            return Ok(MergeResult::Invalid);
        }
        let mut group = db
            .get_group_v2(&record.master_key)?
            .unwrap_or_else(|| GroupV2::new(record.master_key.clone()));
        group.blocked = record.blocked;
        group.whitelisted = record.whitelisted;
        group.archived = record.archived;
        group.mark_unread = record.mark_unread;
        group.dont_notify_for_mentions = record.dont_notify_for_mentions;
        db.upsert_group_v2(&group)?;
        Ok(MergeResult::Merged {
            needs_update: false,
            id: group.master_key,
            affected: Vec::new(),
        })
    }

    fn unknown_fields<'r>(&self, record: &'r GroupV2Record) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: GroupV2Record) -> Record {
        Record::GroupV2(record)
    }

    fn from_record(&self, record: &Record) -> Option<GroupV2Record> {
        match record {
            Record::GroupV2(record) => Some(record.clone()),
            _ => None,
        }
    }

    fn should_restore_orphan(&self, db: &Database, id: &ByteKey) -> ss_core::Result<bool> {
        Ok(db.get_group_v2(id)?.is_some())
    }
}

#[cfg(test)]
#[path = "group_v2_tests.rs"]
mod tests;
