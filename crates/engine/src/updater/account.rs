// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local account record.

use ss_core::{
    AccountRecord, Database, LocalAccount, Record, RecordType, UnknownFields,
};

use super::{LocalIdentifiers, MergeResult, RecordUpdater};

pub struct AccountUpdater {
    local: LocalIdentifiers,
}

impl AccountUpdater {
    pub fn new(local: LocalIdentifiers) -> Self {
        AccountUpdater { local }
    }
}

impl RecordUpdater for AccountUpdater {
    type Id = ();
    type Record = AccountRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Account
    }

    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<()>> {
        Ok(db.get_local_account()?.map(|_| ()).into_iter().collect())
    }

    fn build_record(
        &self,
        db: &Database,
        _id: &(),
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<AccountRecord>> {
        let Some(account) = db.get_local_account()? else {
            return Ok(None);
        };
        Ok(Some(AccountRecord {
            given_name: account.given_name,
            family_name: account.family_name,
            avatar_url: account.avatar_url,
            read_receipts: account.read_receipts,
            typing_indicators: account.typing_indicators,
            link_previews: account.link_previews,
            discoverable_by_phone_number: account.discoverable_by_phone_number,
            universal_expire_timer: account.universal_expire_timer,
            unknown: unknown.cloned().unwrap_or_default(),
        }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &AccountRecord,
    ) -> ss_core::Result<MergeResult<()>> {
        let mut account = match db.get_local_account()? {
            Some(account) => account,
            None => {
                let mut account = LocalAccount::new(self.local.aci.clone());
                account.pni = self.local.pni.clone();
                account.e164 = self.local.e164.clone();
                account
            }
        };

        // A record without a profile name never clears ours; write it back.
        let mut needs_update = false;
        if record.given_name.is_some() {
            account.given_name = record.given_name.clone();
            account.family_name = record.family_name.clone();
        } else if account.given_name.is_some() {
            needs_update = true;
        }

        if record.avatar_url.is_some() {
            account.avatar_url = record.avatar_url.clone();
        }
        account.read_receipts = record.read_receipts;
        account.typing_indicators = record.typing_indicators;
        account.link_previews = record.link_previews;
        account.discoverable_by_phone_number = record.discoverable_by_phone_number;
        account.universal_expire_timer = record.universal_expire_timer;

        db.set_local_account(&account)?;
        Ok(MergeResult::Merged {
            needs_update,
            id: (),
            affected: Vec::new(),
        })
    }

    fn unknown_fields<'r>(&self, record: &'r AccountRecord) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: AccountRecord) -> Record {
        Record::Account(record)
    }

    fn from_record(&self, record: &Record) -> Option<AccountRecord> {
        match record {
            Record::Account(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// A missing account record is handled before any other merge.
    fn should_restore_orphan(&self, _db: &Database, _id: &()) -> ss_core::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
