// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync operations.
//!
//! A [`SyncOperation`] runs one of three modes against the storage service.
//! Internally each mode is a small state machine over [`Step`]: a backup
//! that hits a conflict turns into a merge, a merge entered from a
//! conflict turns back into a backup, and a restore that finds no usable
//! manifest turns into a create.
//!
//! The database lock is only held between network calls, never across one.

pub mod backup;
pub mod cleanup;
pub mod migration;
pub mod restore;

use chrono::Utc;
use ss_core::{ChangeState, Database, Manifest, SyncState};

use crate::context::SyncContext;
use crate::error::{Result, StorageError};
use crate::updater::{Handlers, LocalIdentifiers};

/// What a [`SyncOperation`] was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Push pending local changes.
    Backup,
    /// Pull the latest manifest, or create one if there is none.
    RestoreOrCreate,
    /// Re-examine unknown data and stale bookkeeping.
    CleanUp,
}

/// Result of a successful operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    /// Local changes are pending and a backup should follow.
    pub backup_requested: bool,
}

/// Why a merge was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTrigger {
    /// A fetched manifest is newer than ours.
    Restore,
    /// Our manifest write was rejected in favour of this one.
    Conflict,
}

/// Next unit of work within one operation.
#[derive(Debug)]
pub(crate) enum Step {
    Backup,
    Restore,
    Create { version: u64 },
    Merge { manifest: Manifest, trigger: MergeTrigger },
    CleanUp,
    Done(Completion),
}

/// One run of a sync mode, with retries for transient failures.
pub struct SyncOperation {
    ctx: SyncContext,
    mode: OperationMode,
}

impl SyncOperation {
    pub fn new(ctx: SyncContext, mode: OperationMode) -> Self {
        SyncOperation { ctx, mode }
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Run the operation, retrying transient failures up to the configured
    /// attempt budget.
    pub async fn run(&self) -> Result<Completion> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_once().await {
                Err(e) if e.is_retryable() && attempt < self.ctx.config.max_retries => {
                    let delay = self.ctx.config.backoff(attempt);
                    tracing::warn!(
                        mode = ?self.mode,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "sync operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn run_once(&self) -> Result<Completion> {
        if !self.ctx.keys.is_key_available() {
            tracing::info!(mode = ?self.mode, "skipping sync, storage key unavailable");
            return Ok(Completion::default());
        }
        let account = self.ctx.db.lock().await.get_local_account()?;
        let Some(account) = account else {
            tracing::info!(mode = ?self.mode, "skipping sync, not registered");
            return Ok(Completion::default());
        };

        let local = LocalIdentifiers::from(&account);
        let run = Run {
            ctx: &self.ctx,
            handlers: Handlers::new(&local, &self.ctx.config, Utc::now()),
            local,
        };

        let mut step = match self.mode {
            OperationMode::Backup => Step::Backup,
            OperationMode::RestoreOrCreate => Step::Restore,
            OperationMode::CleanUp => Step::CleanUp,
        };
        loop {
            step = match step {
                Step::Backup => run.backup().await?,
                Step::Restore => run.restore().await?,
                Step::Create { version } => run.create(version).await?,
                Step::Merge { manifest, trigger } => run.merge(manifest, trigger).await?,
                Step::CleanUp => run.clean_up().await?,
                Step::Done(completion) => return Ok(completion),
            };
        }
    }
}

/// Shared state of one operation attempt.
pub(crate) struct Run<'a> {
    ctx: &'a SyncContext,
    handlers: Handlers,
    local: LocalIdentifiers,
}

impl Run<'_> {
    /// Load the sync state with pending self-updates moved to the account.
    fn load_state(&self, db: &Database) -> ss_core::Result<SyncState> {
        let mut state = db.load_sync_state()?;
        normalize(db, &mut state, &self.local)?;
        Ok(state)
    }

    /// Decide how to recover from remote data this device cannot read.
    ///
    /// The primary device owns the key and rewrites everything at
    /// `version`. A linked device drops its key and asks for a new one.
    fn recover(&self, error: StorageError, version: u64) -> Result<Step> {
        if !error.is_decryption_failure() && !error.is_deserialization_failure() {
            return Err(error.into());
        }
        if self.ctx.device.is_primary() {
            tracing::warn!(error = %error, version, "unreadable remote data, recreating manifest");
            return Ok(Step::Create { version });
        }
        if error.is_decryption_failure() {
            tracing::warn!(error = %error, "storage key mismatch, requesting a new key");
            self.ctx.keys.clear_key();
            self.ctx.notifier.request_keys();
        } else {
            tracing::error!(error = %error, "unreadable remote data");
        }
        Err(error.into())
    }
}

/// Move a pending update of the local account's own contact onto the
/// account record.
pub(crate) fn normalize(
    db: &Database,
    state: &mut SyncState,
    local: &LocalIdentifiers,
) -> ss_core::Result<()> {
    for id in state.contacts.pending() {
        let Some(contact) = db.get_contact(&id)? else {
            continue;
        };
        if contact.aci.as_deref() == Some(local.aci.as_str()) {
            tracing::debug!(recipient = %id, "moving self update to account record");
            state.contacts.changes.remove(&id);
            state.account.change = ChangeState::Updated;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
