// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Story distribution list records.
//!
//! Deleted lists stay in the storage service as tombstones so other
//! devices learn about the deletion. "My Story" can never be deleted.

use ss_core::{
    ByteKey, Database, DistributionList, Record, RecordType, StoryDistributionListRecord,
    UnknownFields,
};

use super::{from_millis, to_millis, MergeResult, RecordUpdater};

pub struct DistributionListUpdater;

impl RecordUpdater for DistributionListUpdater {
    type Id = ByteKey;
    type Record = StoryDistributionListRecord;

    fn record_type(&self) -> RecordType {
        RecordType::StoryDistributionList
    }

    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<ByteKey>> {
        db.list_distribution_list_ids()
    }

    fn build_record(
        &self,
        db: &Database,
        id: &ByteKey,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<StoryDistributionListRecord>> {
        Ok(db
            .get_distribution_list(id)?
            .map(|list| StoryDistributionListRecord {
                identifier: list.id,
                name: list.name,
                recipient_service_ids: list.members,
                allows_replies: list.allows_replies,
                is_block_list: list.is_block_list,
                deleted_at_timestamp: to_millis(list.deleted_at),
                unknown: unknown.cloned().unwrap_or_default(),
            }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &StoryDistributionListRecord,
    ) -> ss_core::Result<MergeResult<ByteKey>> {
        if record.identifier.len() != DistributionList::ID_LEN {
            tracing::warn!(len = record.identifier.len(), "distribution list with invalid id");
            return Ok(MergeResult::Invalid);
        }
        let mut list = db
            .get_distribution_list(&record.identifier)?
            .unwrap_or_else(|| DistributionList::new(record.identifier.clone(), ""));

        if let Some(deleted_at) = from_millis(record.deleted_at_timestamp) {
            if list.is_my_story() {
                tracing::warn!("refusing remote deletion of my story");
                db.upsert_distribution_list(&list)?;
                return Ok(MergeResult::Merged {
                    needs_update: true,
                    id: list.id,
                    affected: Vec::new(),
                });
            }
            list.deleted_at = Some(deleted_at);
            list.members.clear();
        } else {
            list.deleted_at = None;
            list.members = record.recipient_service_ids.clone();
        }
        list.name = record.name.clone();
        list.allows_replies = record.allows_replies;
        list.is_block_list = record.is_block_list;

        db.upsert_distribution_list(&list)?;
        Ok(MergeResult::Merged {
            needs_update: false,
            id: list.id,
            affected: Vec::new(),
        })
    }

    fn unknown_fields<'r>(
        &self,
        record: &'r StoryDistributionListRecord,
    ) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: StoryDistributionListRecord) -> Record {
        Record::StoryDistributionList(record)
    }

    fn from_record(&self, record: &Record) -> Option<StoryDistributionListRecord> {
        match record {
            Record::StoryDistributionList(record) => Some(record.clone()),
            _ => None,
        }
    }

    fn should_restore_orphan(&self, db: &Database, id: &ByteKey) -> ss_core::Result<bool> {
        Ok(db.get_distribution_list(id)?.is_some())
    }
}

#[cfg(test)]
#[path = "distribution_list_tests.rs"]
mod tests;
