// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local store.
//!
//! The [`Database`] struct holds the local entities that get synchronized
//! (see [`crate::local`]) and a small key-value table where the serialized
//! [`SyncState`] and other engine bookkeeping live.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::state::SyncState;

/// SQL schema for the local store.
pub const SCHEMA: &str = r#"
-- Engine bookkeeping, one JSON value per (collection, key)
CREATE TABLE IF NOT EXISTS kv (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (collection, key)
);

-- The local account, at most one row
CREATE TABLE IF NOT EXISTS account (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    aci TEXT NOT NULL,
    pni TEXT,
    e164 TEXT,
    given_name TEXT,
    family_name TEXT,
    avatar_url TEXT,
    read_receipts INTEGER NOT NULL DEFAULT 1,
    typing_indicators INTEGER NOT NULL DEFAULT 1,
    link_previews INTEGER NOT NULL DEFAULT 1,
    discoverable_by_phone_number INTEGER NOT NULL DEFAULT 1,
    universal_expire_timer INTEGER NOT NULL DEFAULT 0
);

-- Contacts, keyed by a local unique id
CREATE TABLE IF NOT EXISTS recipients (
    unique_id TEXT PRIMARY KEY,
    aci TEXT UNIQUE,
    pni TEXT UNIQUE,
    e164 TEXT UNIQUE,
    given_name TEXT,
    family_name TEXT,
    blocked INTEGER NOT NULL DEFAULT 0,
    whitelisted INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    unregistered_at TEXT
);

CREATE TABLE IF NOT EXISTS groups_v1 (
    id BLOB PRIMARY KEY,
    blocked INTEGER NOT NULL DEFAULT 0,
    whitelisted INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS groups_v2 (
    master_key BLOB PRIMARY KEY,
    blocked INTEGER NOT NULL DEFAULT 0,
    whitelisted INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    mark_unread INTEGER NOT NULL DEFAULT 0,
    dont_notify_for_mentions INTEGER NOT NULL DEFAULT 0
);

-- Story distribution lists; members is a JSON array of service ids
CREATE TABLE IF NOT EXISTS distribution_lists (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    members TEXT NOT NULL DEFAULT '[]',
    allows_replies INTEGER NOT NULL DEFAULT 1,
    is_block_list INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS call_links (
    root_key BLOB PRIMARY KEY,
    admin_passkey BLOB,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_recipients_unregistered ON recipients(unregistered_at);
CREATE INDEX IF NOT EXISTS idx_call_links_deleted ON call_links(deleted_at);
"#;

/// KV collection holding engine state.
pub const SYNC_COLLECTION: &str = "storage_service";

const SYNC_STATE_KEY: &str = "sync_state";
const MIGRATION_VERSION_KEY: &str = "migration_version";
const COMPLETED_MIGRATIONS_KEY: &str = "completed_unknown_field_migrations";

/// Parse an RFC3339 timestamp from the database.
pub(crate) fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(Error::CorruptedData(format!(
                    "invalid timestamp '{value}' in column '{column}'"
                ))),
            )
        })
}

/// Parse an optional RFC3339 timestamp from the database.
pub(crate) fn parse_timestamp_opt(
    value: Option<String>,
    column: &str,
) -> std::result::Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}

/// Run schema creation on a database connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// SQLite database connection with local store operations.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open a database connection at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Run `f` inside one write transaction, rolling back on error.
    ///
    /// Must not be nested.
    pub fn transaction<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Read a JSON value from the key-value table.
    pub fn kv_get<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write a JSON value to the key-value table.
    pub fn kv_set<T: Serialize + ?Sized>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv (collection, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE SET value = excluded.value",
            params![collection, key, raw],
        )?;
        Ok(())
    }

    /// Remove a key. Returns whether it existed.
    pub fn kv_remove(&self, collection: &str, key: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM kv WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        Ok(affected > 0)
    }

    /// Load the persisted sync state.
    ///
    /// A missing blob yields a fresh state. So does a blob that fails to
    /// decode: the next restore rebuilds it from the remote manifest.
    pub fn load_sync_state(&self) -> Result<SyncState> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE collection = ?1 AND key = ?2",
                params![SYNC_COLLECTION, SYNC_STATE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(SyncState::default());
        };
        match SyncState::decode(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable sync state");
                Ok(SyncState::default())
            }
        }
    }

    /// Persist the sync state.
    pub fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        let raw = state.encode()?;
        self.conn.execute(
            "INSERT INTO kv (collection, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE SET value = excluded.value",
            params![SYNC_COLLECTION, SYNC_STATE_KEY, raw],
        )?;
        Ok(())
    }

    /// Remove the persisted sync state.
    pub fn reset_sync_state(&self) -> Result<()> {
        self.kv_remove(SYNC_COLLECTION, SYNC_STATE_KEY)?;
        Ok(())
    }

    /// Version of the one-time sync migrations already applied.
    pub fn migration_version(&self) -> Result<u32> {
        Ok(self
            .kv_get(SYNC_COLLECTION, MIGRATION_VERSION_KEY)?
            .unwrap_or(0))
    }

    pub fn set_migration_version(&self, version: u32) -> Result<()> {
        self.kv_set(SYNC_COLLECTION, MIGRATION_VERSION_KEY, &version)
    }

    /// Ids of unknown-field migrations that already ran.
    pub fn completed_migrations(&self) -> Result<Vec<String>> {
        Ok(self
            .kv_get(SYNC_COLLECTION, COMPLETED_MIGRATIONS_KEY)?
            .unwrap_or_default())
    }

    pub fn set_completed_migrations(&self, ids: &[String]) -> Result<()> {
        self.kv_set(SYNC_COLLECTION, COMPLETED_MIGRATIONS_KEY, ids)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
