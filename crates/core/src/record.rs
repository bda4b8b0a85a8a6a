// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed storage records.
//!
//! Records travel as JSON objects. Members a build does not recognize are
//! collected into [`UnknownFields`] on decode and written back verbatim on
//! encode, so an older client never strips data a newer one wrote.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::identifier::{ByteKey, RecordType, StorageIdentifier};

/// Record members this build does not understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnknownFields(pub BTreeMap<String, Value>);

impl UnknownFields {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub read_receipts: bool,
    pub typing_indicators: bool,
    pub link_previews: bool,
    pub discoverable_by_phone_number: bool,
    pub universal_expire_timer: u32,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aci: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e164: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
    /// Milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unregistered_at_timestamp: Option<i64>,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupV1Record {
    pub id: ByteKey,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupV2Record {
    pub master_key: ByteKey,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
    pub mark_unread: bool,
    pub dont_notify_for_mentions: bool,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoryDistributionListRecord {
    pub identifier: ByteKey,
    pub name: String,
    pub recipient_service_ids: Vec<String>,
    pub allows_replies: bool,
    pub is_block_list: bool,
    /// Milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at_timestamp: Option<i64>,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallLinkRecord {
    pub root_key: ByteKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_passkey: Option<ByteKey>,
    /// Milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at_timestamp: Option<i64>,
    #[serde(flatten)]
    pub unknown: UnknownFields,
}

/// A decoded record of any type.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Account(AccountRecord),
    Contact(ContactRecord),
    GroupV1(GroupV1Record),
    GroupV2(GroupV2Record),
    StoryDistributionList(StoryDistributionListRecord),
    CallLink(CallLinkRecord),
    /// A record of a type this build cannot parse, kept as raw bytes.
    Unknown {
        record_type: RecordType,
        bytes: Vec<u8>,
    },
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        match self {
            Record::Account(_) => RecordType::Account,
            Record::Contact(_) => RecordType::Contact,
            Record::GroupV1(_) => RecordType::GroupV1,
            Record::GroupV2(_) => RecordType::GroupV2,
            Record::StoryDistributionList(_) => RecordType::StoryDistributionList,
            Record::CallLink(_) => RecordType::CallLink,
            Record::Unknown { record_type, .. } => *record_type,
        }
    }

    /// Decodes record bytes according to the identifier's type.
    pub fn decode(record_type: RecordType, bytes: &[u8]) -> Result<Self> {
        let record = match record_type {
            RecordType::Account => Record::Account(serde_json::from_slice(bytes)?),
            RecordType::Contact => Record::Contact(serde_json::from_slice(bytes)?),
            RecordType::GroupV1 => Record::GroupV1(serde_json::from_slice(bytes)?),
            RecordType::GroupV2 => Record::GroupV2(serde_json::from_slice(bytes)?),
            RecordType::StoryDistributionList => {
                Record::StoryDistributionList(serde_json::from_slice(bytes)?)
            }
            RecordType::CallLink => Record::CallLink(serde_json::from_slice(bytes)?),
            RecordType::Other(_) => Record::Unknown {
                record_type,
                bytes: bytes.to_vec(),
            },
        };
        Ok(record)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Record::Account(r) => serde_json::to_vec(r)?,
            Record::Contact(r) => serde_json::to_vec(r)?,
            Record::GroupV1(r) => serde_json::to_vec(r)?,
            Record::GroupV2(r) => serde_json::to_vec(r)?,
            Record::StoryDistributionList(r) => serde_json::to_vec(r)?,
            Record::CallLink(r) => serde_json::to_vec(r)?,
            Record::Unknown { bytes, .. } => bytes.clone(),
        };
        Ok(bytes)
    }

    /// Unknown members of a parsed record, if any.
    pub fn unknown_fields(&self) -> Option<&UnknownFields> {
        let unknown = match self {
            Record::Account(r) => &r.unknown,
            Record::Contact(r) => &r.unknown,
            Record::GroupV1(r) => &r.unknown,
            Record::GroupV2(r) => &r.unknown,
            Record::StoryDistributionList(r) => &r.unknown,
            Record::CallLink(r) => &r.unknown,
            Record::Unknown { .. } => return None,
        };
        (!unknown.is_empty()).then_some(unknown)
    }
}

/// A record paired with the identifier it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageItem {
    pub identifier: StorageIdentifier,
    pub record: Record,
}

impl StorageItem {
    pub fn new(identifier: StorageIdentifier, record: Record) -> Self {
        StorageItem { identifier, record }
    }

    /// Wraps a record under a freshly generated identifier.
    pub fn generate(record: Record) -> Result<Self> {
        let bytes = record.encode()?;
        let identifier = StorageIdentifier::generate(record.record_type(), &bytes);
        Ok(StorageItem { identifier, record })
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
