// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local entities that are mirrored into the storage service.
//!
//! These are the rows the record updaters read when building records and
//! write when merging remote ones.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{parse_timestamp_opt, Database};
use crate::error::{Error, Result};
use crate::identifier::ByteKey;

/// How long an unregistered contact stays in the storage service.
pub const UNREGISTERED_RETENTION_DAYS: i64 = 30;

/// Id of the "My Story" distribution list.
pub const MY_STORY_ID: [u8; 16] = [0; 16];

/// The local account's profile and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAccount {
    pub aci: String,
    pub pni: Option<String>,
    pub e164: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub avatar_url: Option<String>,
    pub read_receipts: bool,
    pub typing_indicators: bool,
    pub link_previews: bool,
    pub discoverable_by_phone_number: bool,
    pub universal_expire_timer: u32,
}

impl LocalAccount {
    pub fn new(aci: impl Into<String>) -> Self {
        LocalAccount {
            aci: aci.into(),
            pni: None,
            e164: None,
            given_name: None,
            family_name: None,
            avatar_url: None,
            read_receipts: true,
            typing_indicators: true,
            link_previews: true,
            discoverable_by_phone_number: true,
            universal_expire_timer: 0,
        }
    }
}

/// A contact (recipient) row.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub unique_id: String,
    pub aci: Option<String>,
    pub pni: Option<String>,
    pub e164: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
    pub unregistered_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Contact {
            unique_id: unique_id.into(),
            aci: None,
            pni: None,
            e164: None,
            given_name: None,
            family_name: None,
            blocked: false,
            whitelisted: false,
            archived: false,
            unregistered_at: None,
        }
    }

    /// Generates a fresh local unique id.
    pub fn generate_unique_id() -> String {
        format!("r-{}", hex::encode(rand::random::<[u8; 8]>()))
    }

    pub fn is_registered(&self) -> bool {
        self.unregistered_at.is_none()
    }

    pub fn has_service_identifier(&self) -> bool {
        self.aci.is_some() || self.pni.is_some() || self.e164.is_some()
    }

    /// Whether this contact belongs in the storage service at `now`.
    pub fn should_be_in_storage_service(&self, now: DateTime<Utc>) -> bool {
        if !self.has_service_identifier() {
            return false;
        }
        match self.unregistered_at {
            None => true,
            Some(at) => now - at <= Duration::days(UNREGISTERED_RETENTION_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupV1 {
    pub id: ByteKey,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
}

impl GroupV1 {
    pub const ID_LEN: usize = 16;

    pub fn new(id: ByteKey) -> Self {
        GroupV1 {
            id,
            blocked: false,
            whitelisted: false,
            archived: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupV2 {
    pub master_key: ByteKey,
    pub blocked: bool,
    pub whitelisted: bool,
    pub archived: bool,
    pub mark_unread: bool,
    pub dont_notify_for_mentions: bool,
}

impl GroupV2 {
    pub const MASTER_KEY_LEN: usize = 32;

    pub fn new(master_key: ByteKey) -> Self {
        GroupV2 {
            master_key,
            blocked: false,
            whitelisted: false,
            archived: false,
            mark_unread: false,
            dont_notify_for_mentions: false,
        }
    }
}

/// A story distribution list.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionList {
    pub id: ByteKey,
    pub name: String,
    pub members: Vec<String>,
    pub allows_replies: bool,
    pub is_block_list: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DistributionList {
    pub const ID_LEN: usize = 16;

    pub fn new(id: ByteKey, name: impl Into<String>) -> Self {
        DistributionList {
            id,
            name: name.into(),
            members: Vec::new(),
            allows_replies: true,
            is_block_list: false,
            deleted_at: None,
        }
    }

    pub fn is_my_story(&self) -> bool {
        self.id.as_bytes() == MY_STORY_ID
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallLink {
    pub root_key: ByteKey,
    pub admin_passkey: Option<ByteKey>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CallLink {
    pub const ROOT_KEY_LEN: usize = 16;

    pub fn new(root_key: ByteKey) -> Self {
        CallLink {
            root_key,
            admin_passkey: None,
            deleted_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.admin_passkey.is_some()
    }
}

fn contact_from_row(row: &Row<'_>) -> std::result::Result<Contact, rusqlite::Error> {
    Ok(Contact {
        unique_id: row.get(0)?,
        aci: row.get(1)?,
        pni: row.get(2)?,
        e164: row.get(3)?,
        given_name: row.get(4)?,
        family_name: row.get(5)?,
        blocked: row.get(6)?,
        whitelisted: row.get(7)?,
        archived: row.get(8)?,
        unregistered_at: parse_timestamp_opt(row.get(9)?, "unregistered_at")?,
    })
}

const CONTACT_COLUMNS: &str = "unique_id, aci, pni, e164, given_name, family_name,
    blocked, whitelisted, archived, unregistered_at";

impl Database {
    /// Get the local account, if one was set up.
    pub fn get_local_account(&self) -> Result<Option<LocalAccount>> {
        let account = self
            .conn
            .query_row(
                "SELECT aci, pni, e164, given_name, family_name, avatar_url, read_receipts,
                        typing_indicators, link_previews, discoverable_by_phone_number,
                        universal_expire_timer
                 FROM account WHERE id = 1",
                [],
                |row| {
                    Ok(LocalAccount {
                        aci: row.get(0)?,
                        pni: row.get(1)?,
                        e164: row.get(2)?,
                        given_name: row.get(3)?,
                        family_name: row.get(4)?,
                        avatar_url: row.get(5)?,
                        read_receipts: row.get(6)?,
                        typing_indicators: row.get(7)?,
                        link_previews: row.get(8)?,
                        discoverable_by_phone_number: row.get(9)?,
                        universal_expire_timer: row.get(10)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    /// Create or replace the local account.
    pub fn set_local_account(&self, account: &LocalAccount) -> Result<()> {
        self.conn.execute(
            "INSERT INTO account (id, aci, pni, e164, given_name, family_name, avatar_url,
                read_receipts, typing_indicators, link_previews,
                discoverable_by_phone_number, universal_expire_timer)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                aci = excluded.aci, pni = excluded.pni, e164 = excluded.e164,
                given_name = excluded.given_name, family_name = excluded.family_name,
                avatar_url = excluded.avatar_url, read_receipts = excluded.read_receipts,
                typing_indicators = excluded.typing_indicators,
                link_previews = excluded.link_previews,
                discoverable_by_phone_number = excluded.discoverable_by_phone_number,
                universal_expire_timer = excluded.universal_expire_timer",
            params![
                account.aci,
                account.pni,
                account.e164,
                account.given_name,
                account.family_name,
                account.avatar_url,
                account.read_receipts,
                account.typing_indicators,
                account.link_previews,
                account.discoverable_by_phone_number,
                account.universal_expire_timer,
            ],
        )?;
        Ok(())
    }

    /// Insert or update a contact by unique id.
    pub fn upsert_contact(&self, contact: &Contact) -> Result<()> {
        self.conn.execute(
            "INSERT INTO recipients (unique_id, aci, pni, e164, given_name, family_name,
                blocked, whitelisted, archived, unregistered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(unique_id) DO UPDATE SET
                aci = excluded.aci, pni = excluded.pni, e164 = excluded.e164,
                given_name = excluded.given_name, family_name = excluded.family_name,
                blocked = excluded.blocked, whitelisted = excluded.whitelisted,
                archived = excluded.archived, unregistered_at = excluded.unregistered_at",
            params![
                contact.unique_id,
                contact.aci,
                contact.pni,
                contact.e164,
                contact.given_name,
                contact.family_name,
                contact.blocked,
                contact.whitelisted,
                contact.archived,
                contact.unregistered_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_contact(&self, unique_id: &str) -> Result<Option<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM recipients WHERE unique_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![unique_id], contact_from_row)
            .optional()?)
    }

    /// Get a contact, failing if it does not exist.
    pub fn require_contact(&self, unique_id: &str) -> Result<Contact> {
        self.get_contact(unique_id)?
            .ok_or_else(|| Error::RecipientNotFound(unique_id.to_string()))
    }

    fn find_contact_by(&self, column: &str, value: &str) -> Result<Option<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM recipients WHERE {column} = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![value], contact_from_row)
            .optional()?)
    }

    pub fn find_contact_by_aci(&self, aci: &str) -> Result<Option<Contact>> {
        self.find_contact_by("aci", aci)
    }

    pub fn find_contact_by_pni(&self, pni: &str) -> Result<Option<Contact>> {
        self.find_contact_by("pni", pni)
    }

    pub fn find_contact_by_e164(&self, e164: &str) -> Result<Option<Contact>> {
        self.find_contact_by("e164", e164)
    }

    /// Find a contact by a service id (ACI or PNI), creating one if needed.
    pub fn fetch_or_create_contact(&self, service_id: &str, is_pni: bool) -> Result<Contact> {
        let existing = if is_pni {
            self.find_contact_by_pni(service_id)?
        } else {
            self.find_contact_by_aci(service_id)?
        };
        if let Some(contact) = existing {
            return Ok(contact);
        }
        let mut contact = Contact::new(Contact::generate_unique_id());
        if is_pni {
            contact.pni = Some(service_id.to_string());
        } else {
            contact.aci = Some(service_id.to_string());
        }
        self.upsert_contact(&contact)?;
        Ok(contact)
    }

    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM recipients ORDER BY unique_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map([], contact_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    pub fn delete_contact(&self, unique_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM recipients WHERE unique_id = ?1",
            params![unique_id],
        )?;
        Ok(affected > 0)
    }

    pub fn upsert_group_v1(&self, group: &GroupV1) -> Result<()> {
        self.conn.execute(
            "INSERT INTO groups_v1 (id, blocked, whitelisted, archived) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET blocked = excluded.blocked,
                whitelisted = excluded.whitelisted, archived = excluded.archived",
            params![group.id, group.blocked, group.whitelisted, group.archived],
        )?;
        Ok(())
    }

    pub fn get_group_v1(&self, id: &ByteKey) -> Result<Option<GroupV1>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, blocked, whitelisted, archived FROM groups_v1 WHERE id = ?1",
                params![id],
                |row| {
                    Ok(GroupV1 {
                        id: row.get(0)?,
                        blocked: row.get(1)?,
                        whitelisted: row.get(2)?,
                        archived: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_group_v1_ids(&self) -> Result<Vec<ByteKey>> {
        self.list_keys("SELECT id FROM groups_v1 ORDER BY id")
    }

    pub fn upsert_group_v2(&self, group: &GroupV2) -> Result<()> {
        self.conn.execute(
            "INSERT INTO groups_v2 (master_key, blocked, whitelisted, archived, mark_unread,
                dont_notify_for_mentions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(master_key) DO UPDATE SET blocked = excluded.blocked,
                whitelisted = excluded.whitelisted, archived = excluded.archived,
                mark_unread = excluded.mark_unread,
                dont_notify_for_mentions = excluded.dont_notify_for_mentions",
            params![
                group.master_key,
                group.blocked,
                group.whitelisted,
                group.archived,
                group.mark_unread,
                group.dont_notify_for_mentions,
            ],
        )?;
        Ok(())
    }

    pub fn get_group_v2(&self, master_key: &ByteKey) -> Result<Option<GroupV2>> {
        Ok(self
            .conn
            .query_row(
                "SELECT master_key, blocked, whitelisted, archived, mark_unread,
                        dont_notify_for_mentions
                 FROM groups_v2 WHERE master_key = ?1",
                params![master_key],
                |row| {
                    Ok(GroupV2 {
                        master_key: row.get(0)?,
                        blocked: row.get(1)?,
                        whitelisted: row.get(2)?,
                        archived: row.get(3)?,
                        mark_unread: row.get(4)?,
                        dont_notify_for_mentions: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_group_v2_keys(&self) -> Result<Vec<ByteKey>> {
        self.list_keys("SELECT master_key FROM groups_v2 ORDER BY master_key")
    }

    pub fn upsert_distribution_list(&self, list: &DistributionList) -> Result<()> {
        let members = serde_json::to_string(&list.members)?;
        self.conn.execute(
            "INSERT INTO distribution_lists (id, name, members, allows_replies, is_block_list,
                deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, members = excluded.members,
                allows_replies = excluded.allows_replies,
                is_block_list = excluded.is_block_list, deleted_at = excluded.deleted_at",
            params![
                list.id,
                list.name,
                members,
                list.allows_replies,
                list.is_block_list,
                list.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_distribution_list(&self, id: &ByteKey) -> Result<Option<DistributionList>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, members, allows_replies, is_block_list, deleted_at
                 FROM distribution_lists WHERE id = ?1",
                params![id],
                |row| {
                    let members: String = row.get(2)?;
                    Ok((
                        DistributionList {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            members: Vec::new(),
                            allows_replies: row.get(3)?,
                            is_block_list: row.get(4)?,
                            deleted_at: parse_timestamp_opt(row.get(5)?, "deleted_at")?,
                        },
                        members,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((mut list, members)) => {
                list.members = serde_json::from_str(&members)
                    .map_err(|e| Error::CorruptedData(format!("distribution list members: {e}")))?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    pub fn list_distribution_list_ids(&self) -> Result<Vec<ByteKey>> {
        self.list_keys("SELECT id FROM distribution_lists ORDER BY id")
    }

    pub fn delete_distribution_list(&self, id: &ByteKey) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM distribution_lists WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    pub fn upsert_call_link(&self, link: &CallLink) -> Result<()> {
        self.conn.execute(
            "INSERT INTO call_links (root_key, admin_passkey, deleted_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(root_key) DO UPDATE SET admin_passkey = excluded.admin_passkey,
                deleted_at = excluded.deleted_at",
            params![
                link.root_key,
                link.admin_passkey,
                link.deleted_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_call_link(&self, root_key: &ByteKey) -> Result<Option<CallLink>> {
        Ok(self
            .conn
            .query_row(
                "SELECT root_key, admin_passkey, deleted_at FROM call_links WHERE root_key = ?1",
                params![root_key],
                |row| {
                    Ok(CallLink {
                        root_key: row.get(0)?,
                        admin_passkey: row.get(1)?,
                        deleted_at: parse_timestamp_opt(row.get(2)?, "deleted_at")?,
                    })
                },
            )
            .optional()?)
    }

    pub fn list_call_link_keys(&self) -> Result<Vec<ByteKey>> {
        self.list_keys("SELECT root_key FROM call_links ORDER BY root_key")
    }

    /// Remove call links deleted before `cutoff`. Returns their root keys.
    pub fn purge_call_links_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ByteKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT root_key, deleted_at FROM call_links WHERE deleted_at IS NOT NULL",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let key: ByteKey = row.get(0)?;
                let deleted_at = parse_timestamp_opt(row.get(1)?, "deleted_at")?;
                Ok((key, deleted_at))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut purged = Vec::new();
        for (key, deleted_at) in rows {
            if deleted_at.is_some_and(|at| at < cutoff) {
                self.conn
                    .execute("DELETE FROM call_links WHERE root_key = ?1", params![key])?;
                purged.push(key);
            }
        }
        Ok(purged)
    }

    fn list_keys(&self, sql: &str) -> Result<Vec<ByteKey>> {
        let mut stmt = self.conn.prepare(sql)?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<ByteKey>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
