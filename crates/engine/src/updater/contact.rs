// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contact records.
//!
//! Merging resolves the record to a local recipient by ACI, then PNI, then
//! phone number. Any identifier the record names is taken away from every
//! other recipient, which is how remote identity merges and splits are
//! applied locally. Records without an ACI are merged last so those
//! identity changes are already visible.

use chrono::{DateTime, Utc};
use ss_core::{Contact, ContactRecord, Database, Record, RecordType, UnknownFields};

use super::{from_millis, to_millis, LocalIdentifiers, MergeResult, RecordUpdater};

pub struct ContactUpdater {
    local: LocalIdentifiers,
    now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
enum ServiceId {
    Aci,
    Pni,
    E164,
}

impl ServiceId {
    fn find(self, db: &Database, value: &str) -> ss_core::Result<Option<Contact>> {
        match self {
            ServiceId::Aci => db.find_contact_by_aci(value),
            ServiceId::Pni => db.find_contact_by_pni(value),
            ServiceId::E164 => db.find_contact_by_e164(value),
        }
    }

    fn slot(self, contact: &mut Contact) -> &mut Option<String> {
        match self {
            ServiceId::Aci => &mut contact.aci,
            ServiceId::Pni => &mut contact.pni,
            ServiceId::E164 => &mut contact.e164,
        }
    }
}

fn service_ids(record: &ContactRecord) -> [(ServiceId, Option<&str>); 3] {
    [
        (ServiceId::Aci, record.aci.as_deref()),
        (ServiceId::Pni, record.pni.as_deref()),
        (ServiceId::E164, record.e164.as_deref()),
    ]
}

/// Take `remote` when present; otherwise keep `local` and note that the
/// remote copy is missing data.
fn merge_field(local: &mut Option<String>, remote: &Option<String>, needs_update: &mut bool) {
    match remote {
        Some(value) => *local = Some(value.clone()),
        None if local.is_some() => *needs_update = true,
        None => {}
    }
}

impl ContactUpdater {
    pub fn new(local: LocalIdentifiers, now: DateTime<Utc>) -> Self {
        ContactUpdater { local, now }
    }

    fn resolve(&self, db: &Database, record: &ContactRecord) -> ss_core::Result<Contact> {
        if let Some(aci) = record.aci.as_deref() {
            if let Some(contact) = db.find_contact_by_aci(aci)? {
                return Ok(contact);
            }
        }
        for (kind, value) in service_ids(record).into_iter().skip(1) {
            let Some(value) = value else { continue };
            if let Some(contact) = kind.find(db, value)? {
                // A recipient with a different ACI is someone else.
                if contact.aci.is_none() || contact.aci == record.aci {
                    return Ok(contact);
                }
            }
        }
        Ok(Contact::new(Contact::generate_unique_id()))
    }
}

impl RecordUpdater for ContactUpdater {
    type Id = String;
    type Record = ContactRecord;

    fn record_type(&self) -> RecordType {
        RecordType::Contact
    }

    fn local_ids(&self, db: &Database) -> ss_core::Result<Vec<String>> {
        Ok(db
            .list_contacts()?
            .into_iter()
            .filter(|c| c.aci.as_deref() != Some(self.local.aci.as_str()))
            .map(|c| c.unique_id)
            .collect())
    }

    fn build_record(
        &self,
        db: &Database,
        id: &String,
        unknown: Option<&UnknownFields>,
    ) -> ss_core::Result<Option<ContactRecord>> {
        let Some(contact) = db.get_contact(id)? else {
            return Ok(None);
        };
        if !contact.should_be_in_storage_service(self.now) {
            return Ok(None);
        }
        if self.local.contains_any(
            contact.aci.as_deref(),
            contact.pni.as_deref(),
            contact.e164.as_deref(),
        ) {
            return Ok(None);
        }
        Ok(Some(ContactRecord {
            aci: contact.aci,
            pni: contact.pni,
            e164: contact.e164,
            given_name: contact.given_name,
            family_name: contact.family_name,
            blocked: contact.blocked,
            whitelisted: contact.whitelisted,
            archived: contact.archived,
            unregistered_at_timestamp: to_millis(contact.unregistered_at),
            unknown: unknown.cloned().unwrap_or_default(),
        }))
    }

    fn merge_record(
        &self,
        db: &Database,
        record: &ContactRecord,
    ) -> ss_core::Result<MergeResult<String>> {
        if record.aci.is_none() && record.pni.is_none() && record.e164.is_none() {
            return Ok(MergeResult::Invalid);
        }
        if self.local.contains_any(
            record.aci.as_deref(),
            record.pni.as_deref(),
            record.e164.as_deref(),
        ) {
            tracing::warn!("contact record refers to the local account");
            return Ok(MergeResult::Invalid);
        }

        let mut contact = self.resolve(db, record)?;

        let mut affected = Vec::new();
        for (kind, value) in service_ids(record) {
            let Some(value) = value else { continue };
            let Some(mut holder) = kind.find(db, value)? else {
                continue;
            };
            if holder.unique_id == contact.unique_id {
                continue;
            }
            tracing::debug!(from = %holder.unique_id, to = %contact.unique_id, ?kind, "moving service id");
            *kind.slot(&mut holder) = None;
            db.upsert_contact(&holder)?;
            if !affected.contains(&holder.unique_id) {
                affected.push(holder.unique_id);
            }
        }

        let mut needs_update = false;
        merge_field(&mut contact.aci, &record.aci, &mut needs_update);
        merge_field(&mut contact.pni, &record.pni, &mut needs_update);
        merge_field(&mut contact.e164, &record.e164, &mut needs_update);

        if record.given_name.is_some() || record.family_name.is_some() {
            contact.given_name = record.given_name.clone();
            contact.family_name = record.family_name.clone();
        } else if contact.given_name.is_some() || contact.family_name.is_some() {
            needs_update = true;
        }

        contact.blocked = record.blocked;
        contact.whitelisted = record.whitelisted;
        contact.archived = record.archived;
        contact.unregistered_at = from_millis(record.unregistered_at_timestamp);

        db.upsert_contact(&contact)?;
        Ok(MergeResult::Merged {
            needs_update,
            id: contact.unique_id,
            affected,
        })
    }

    fn unknown_fields<'r>(&self, record: &'r ContactRecord) -> Option<&'r UnknownFields> {
        (!record.unknown.is_empty()).then_some(&record.unknown)
    }

    fn into_record(&self, record: ContactRecord) -> Record {
        Record::Contact(record)
    }

    fn from_record(&self, record: &Record) -> Option<ContactRecord> {
        match record {
            Record::Contact(record) => Some(record.clone()),
            _ => None,
        }
    }

    fn should_defer(&self, record: &ContactRecord) -> bool {
        record.aci.is_none()
    }

    /// Only registered contacts come back; anyone else may be dropped by
    /// another device.
    fn should_restore_orphan(&self, db: &Database, id: &String) -> ss_core::Result<bool> {
        Ok(db
            .get_contact(id)?
            .is_some_and(|c| c.should_be_in_storage_service(self.now) && c.is_registered()))
    }
}

#[cfg(test)]
#[path = "contact_tests.rs"]
mod tests;
