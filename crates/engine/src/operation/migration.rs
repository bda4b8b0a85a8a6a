// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-time migrations over cached records with unknown fields.
//!
//! A newer build may learn to read a field an older build stored as
//! unknown. Before those records are merged again, each registered
//! migration gets one chance to look at them, keyed by its id.

use ss_core::{Database, Record};

/// A migration that runs once over the cached unknown-field records.
pub trait UnknownFieldMigration: Send + Sync {
    /// Stable id, persisted once the migration has run.
    fn id(&self) -> &str;

    fn run(&self, records: &[Record], db: &Database) -> ss_core::Result<()>;
}

/// Run every migration not yet recorded as complete, then record them.
///
/// Returns the ids that ran.
pub fn run_pending(
    migrations: &[std::sync::Arc<dyn UnknownFieldMigration>],
    records: &[Record],
    db: &Database,
) -> ss_core::Result<Vec<String>> {
    let mut completed = db.completed_migrations()?;
    let mut ran = Vec::new();
    for migration in migrations {
        let id = migration.id();
        if completed.iter().any(|done| done == id) {
            continue;
        }
        tracing::info!(migration = id, records = records.len(), "running unknown field migration");
        migration.run(records, db)?;
        completed.push(id.to_string());
        ran.push(id.to_string());
    }
    if !ran.is_empty() {
        db.set_completed_migrations(&completed)?;
    }
    Ok(ran)
}

/// Whether any migration still has to run.
pub fn has_pending(
    migrations: &[std::sync::Arc<dyn UnknownFieldMigration>],
    db: &Database,
) -> ss_core::Result<bool> {
    if migrations.is_empty() {
        return Ok(false);
    }
    let completed = db.completed_migrations()?;
    Ok(migrations
        .iter()
        .any(|m| !completed.iter().any(|done| done == m.id())))
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
