// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the stored manifest and items in SQLite. Writes are accepted by
//! version only: the first manifest may carry any version, every later one
//! must be exactly one more than the stored version.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use ss_core::protocol::{WireItem, WireManifest};
use ss_core::{ByteKey, Error, Result};
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS manifest (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    value BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    key BLOB PRIMARY KEY,
    value BLOB NOT NULL
);
"#;

/// Answer to a manifest fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestLookup {
    NoExisting,
    NoNewer,
    Latest(WireManifest),
}

/// Answer to a proposed manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Accepted(u64),
    /// Rejected; carries the stored manifest.
    Conflict(WireManifest),
}

/// A proposed manifest with its item changes.
#[derive(Debug, Clone)]
pub struct ManifestWrite {
    pub manifest: WireManifest,
    pub insert: Vec<WireItem>,
    pub delete: Vec<ByteKey>,
    pub delete_all: bool,
}

/// Shared server state containing the storage database.
#[derive(Clone)]
pub struct ServerState {
    conn: Arc<Mutex<Connection>>,
}

impl ServerState {
    /// Opens the storage database in the given directory.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join("storage.db"))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(ServerState {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn fetch_manifest(&self, greater_than: Option<u64>) -> Result<ManifestLookup> {
        let conn = self.conn.lock().await;
        let Some(manifest) = current_manifest(&conn)? else {
            return Ok(ManifestLookup::NoExisting);
        };
        if greater_than.is_some_and(|version| manifest.version <= version) {
            return Ok(ManifestLookup::NoNewer);
        }
        Ok(ManifestLookup::Latest(manifest))
    }

    /// Returns the stored items among `keys`. Unknown keys are skipped.
    pub async fn fetch_items(&self, keys: &[ByteKey]) -> Result<Vec<WireItem>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT value FROM items WHERE key = ?1")?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<Vec<u8>> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            if let Some(value) = value {
                items.push(WireItem {
                    key: key.clone(),
                    value,
                });
            }
        }
        Ok(items)
    }

    /// Applies a write if its version is the next one, all in one
    /// transaction.
    pub async fn update_manifest(&self, write: ManifestWrite) -> Result<UpdateOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if let Some(current) = current_manifest(&tx)? {
            if write.manifest.version != current.version + 1 {
                tracing::debug!(
                    proposed = write.manifest.version,
                    current = current.version,
                    "rejecting manifest"
                );
                return Ok(UpdateOutcome::Conflict(current));
            }
        }

        if write.delete_all {
            tx.execute("DELETE FROM items", [])?;
        }
        for key in &write.delete {
            tx.execute("DELETE FROM items WHERE key = ?1", params![key])?;
        }
        for item in &write.insert {
            tx.execute(
                "INSERT OR REPLACE INTO items (key, value) VALUES (?1, ?2)",
                params![item.key, item.value],
            )?;
        }
        let version = i64::try_from(write.manifest.version).map_err(|_| {
            Error::InvalidInput(format!("manifest version {} out of range", write.manifest.version))
        })?;
        tx.execute(
            "INSERT OR REPLACE INTO manifest (id, version, value) VALUES (1, ?1, ?2)",
            params![version, write.manifest.value],
        )?;
        tx.commit()?;

        tracing::info!(
            version = write.manifest.version,
            inserted = write.insert.len(),
            deleted = write.delete.len(),
            delete_all = write.delete_all,
            "manifest accepted"
        );
        Ok(UpdateOutcome::Accepted(write.manifest.version))
    }

    pub async fn item_count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn current_manifest(conn: &Connection) -> Result<Option<WireManifest>> {
    Ok(conn
        .query_row(
            "SELECT version, value FROM manifest WHERE id = 1",
            [],
            |row| {
                let version: i64 = row.get(0)?;
                Ok(WireManifest {
                    version: u64::try_from(version)
                        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, version))?,
                    value: row.get(1)?,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
