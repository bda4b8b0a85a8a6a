// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Opportunistic clean-up of unknown data and stale bookkeeping.

use chrono::Utc;
use ss_core::{Database, Record, SyncState};

use super::migration;
use super::{Completion, Run, Step};
use crate::error::Result;

/// Latest one-time sync migration.
const MIGRATION_VERSION: u32 = 1;

impl Run<'_> {
    pub(crate) async fn clean_up(&self) -> Result<Step> {
        let db = self.ctx.db.lock().await;
        let mut state = self.load_state(&db)?;

        let now_known: usize = state
            .unknown_identifiers
            .iter()
            .filter(|(record_type, _)| self.handlers.is_known(**record_type))
            .map(|(_, ids)| ids.len())
            .sum();
        if now_known > 0 {
            tracing::info!(now_known, "unknown identifiers are now readable, refetching manifest");
            state.refetch_latest_manifest = true;
            db.save_sync_state(&state)?;
        }

        let checked = state.unknown_field_last_checked_app_version.as_deref();
        if checked != Some(self.ctx.app_version.as_str())
            || migration::has_pending(&self.ctx.migrations, &db)?
        {
            db.transaction(|db| self.remerge_unknown_fields(db, &mut state))?;
        }

        let orphaned = db.transaction(|db| {
            let marked = mark_orphaned_contacts(db, &mut state)?;
            run_migrations(db, &mut state, &self.local.aci)?;
            db.save_sync_state(&state)?;
            Ok(marked)
        })?;
        if orphaned > 0 {
            tracing::info!(orphaned, "marked orphaned contacts for update");
        }

        Ok(Step::Done(Completion {
            backup_requested: state.has_pending_changes(),
        }))
    }

    /// Give every cached unknown-field record another merge with this
    /// build, after any pending migrations have seen them.
    fn remerge_unknown_fields(&self, db: &Database, state: &mut SyncState) -> ss_core::Result<()> {
        let records: Vec<Record> = self
            .handlers
            .iter()
            .flat_map(|h| h.records_with_unknown_fields(state))
            .collect();
        migration::run_pending(&self.ctx.migrations, &records, db)?;

        let mut remaining = 0;
        for handler in self.handlers.iter() {
            remaining += handler.remerge_unknown_fields(db, state)?;
        }
        tracing::info!(
            app_version = %self.ctx.app_version,
            checked = records.len(),
            remaining,
            "checked records with unknown fields"
        );
        state.unknown_field_last_checked_app_version = Some(self.ctx.app_version.clone());
        db.save_sync_state(state)
    }
}

/// Mark contacts that hold an identifier but no longer belong in the
/// storage service, so the next backup deletes their records.
fn mark_orphaned_contacts(db: &Database, state: &mut SyncState) -> ss_core::Result<usize> {
    let now = Utc::now();
    let mut marked = 0;
    let ids: Vec<String> = state.contacts.identifiers.keys().cloned().collect();
    for id in ids {
        if state.contacts.change(&id).is_pending() {
            continue;
        }
        let live = db
            .get_contact(&id)?
            .is_some_and(|c| c.should_be_in_storage_service(now));
        if !live {
            state.contacts.mark_updated(id);
            marked += 1;
        }
    }
    Ok(marked)
}

/// Apply the one-time sync migrations this database has not seen yet.
fn run_migrations(db: &Database, state: &mut SyncState, self_aci: &str) -> ss_core::Result<()> {
    let version = db.migration_version()?;
    if version >= MIGRATION_VERSION {
        return Ok(());
    }
    if version < 1 {
        // Records written before PNIs were synced lack them.
        let mut marked = 0;
        for contact in db.list_contacts()? {
            if contact.pni.is_some() && contact.aci.as_deref() != Some(self_aci) {
                state.contacts.mark_updated(contact.unique_id);
                marked += 1;
            }
        }
        tracing::info!(marked, "migration 1: re-uploading contacts with a PNI");
    }
    db.set_migration_version(MIGRATION_VERSION)
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
