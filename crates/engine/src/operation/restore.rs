// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Restoring from the remote manifest: fetch, create and merge.

use std::collections::BTreeSet;

use ss_core::{
    ChangeState, Manifest, RecordType, StorageIdentifier, StorageItem, SyncState,
};

use super::{Completion, MergeTrigger, Run, Step};
use crate::error::{Result, StorageError, SyncError};
use crate::service::{ManifestFetch, ManifestUpdate};

impl Run<'_> {
    /// Fetch the remote manifest and decide between create, merge and
    /// nothing at all.
    pub(crate) async fn restore(&self) -> Result<Step> {
        let state = self.ctx.db.lock().await.load_sync_state()?;
        let greater_than = if state.refetch_latest_manifest {
            None
        } else {
            Some(state.manifest_version)
        };

        let fetched = match self.ctx.service.fetch_latest_manifest(greater_than).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let version = match &e {
                    StorageError::ManifestDecryptionFailed { version }
                    | StorageError::ManifestDeserializationFailed { version } => *version,
                    _ => state.manifest_version,
                };
                return self.recover(e, version + 1);
            }
        };
        match fetched {
            ManifestFetch::NoExistingManifest => {
                tracing::info!("no remote manifest, creating one");
                Ok(Step::Create { version: 1 })
            }
            ManifestFetch::NoNewerManifest => {
                tracing::debug!(version = state.manifest_version, "manifest is up to date");
                Ok(Step::Done(Completion::default()))
            }
            ManifestFetch::Latest(manifest)
                if manifest.version == state.manifest_version
                    && !state.refetch_latest_manifest =>
            {
                tracing::debug!(manifest = %manifest, "manifest is up to date");
                Ok(Step::Done(Completion::default()))
            }
            ManifestFetch::Latest(manifest) => Ok(Step::Merge {
                manifest,
                trigger: MergeTrigger::Restore,
            }),
        }
    }

    /// Write every local entity under a new manifest at `version`,
    /// replacing whatever the service held before.
    pub(crate) async fn create(&self, version: u64) -> Result<Step> {
        let (mut state, items) = {
            let db = self.ctx.db.lock().await;
            let previous = db.load_sync_state()?;
            let mut state = SyncState {
                manifest_version: version,
                unknown_field_last_checked_app_version: previous
                    .unknown_field_last_checked_app_version,
                ..Default::default()
            };
            let mut items = Vec::new();
            for handler in self.handlers.iter() {
                handler.create_all(&db, &mut state, &mut items)?;
            }
            (state, items)
        };

        let manifest = Manifest::new(
            version,
            Some(self.ctx.device.device_id),
            state.all_identifiers(),
        );
        tracing::info!(manifest = %manifest, items = items.len(), "creating manifest");
        let update = ManifestUpdate {
            manifest: manifest.clone(),
            new_items: items,
            deleted_identifiers: Vec::new(),
            delete_all_existing: version > 1,
        };

        match self.ctx.service.update_manifest(update).await? {
            None => {
                state.consecutive_conflicts = 0;
                self.ctx.db.lock().await.save_sync_state(&state)?;
                self.ctx.notifier.manifest_changed(&manifest);
                Ok(Step::Done(Completion::default()))
            }
            Some(conflict) => {
                tracing::info!(
                    proposed = %manifest,
                    remote = %conflict,
                    "create conflicted, merging remote manifest"
                );
                Ok(Step::Merge {
                    manifest: conflict,
                    trigger: MergeTrigger::Conflict,
                })
            }
        }
    }

    /// Bring local data up to `manifest`.
    pub(crate) async fn merge(&self, manifest: Manifest, trigger: MergeTrigger) -> Result<Step> {
        let mut state = {
            let db = self.ctx.db.lock().await;
            let mut state = self.load_state(&db)?;
            if trigger == MergeTrigger::Conflict {
                state.consecutive_conflicts += 1;
                if state.consecutive_conflicts > self.ctx.config.max_consecutive_conflicts {
                    let conflicts = state.consecutive_conflicts;
                    state.consecutive_conflicts = 0;
                    db.save_sync_state(&state)?;
                    tracing::error!(conflicts, "too many consecutive conflicts, giving up");
                    return Err(SyncError::TooManyConflicts { conflicts });
                }
                db.save_sync_state(&state)?;
            }
            state
        };

        let remote = manifest.identifier_set();
        let local = state.all_identifiers();
        let mut changed: BTreeSet<StorageIdentifier> = remote.difference(&local).cloned().collect();
        for (record_type, identifiers) in &state.unknown_identifiers {
            if self.handlers.is_known(*record_type) {
                changed.extend(identifiers.iter().filter(|id| remote.contains(id)).cloned());
            }
        }
        tracing::info!(
            manifest = %manifest,
            merging = changed.len(),
            local = local.len(),
            remote = remote.len(),
            "merging manifest"
        );

        let account_ids: Vec<StorageIdentifier> = changed
            .iter()
            .filter(|id| id.record_type == RecordType::Account)
            .cloned()
            .collect();
        for id in &account_ids {
            changed.remove(id);
        }
        if let Some(step) = self
            .merge_account(&mut state, &remote, account_ids.first(), manifest.version)
            .await?
        {
            return Ok(step);
        }

        for identifiers in state.unknown_identifiers.values_mut() {
            identifiers.retain(|id| remote.contains(id));
        }
        state.unknown_identifiers.retain(|_, ids| !ids.is_empty());

        let batch_size = self.ctx.config.batch_size();
        let changed: Vec<StorageIdentifier> = changed.into_iter().collect();
        let mut deferred = Vec::new();
        for batch in changed.chunks(batch_size) {
            let items = match self.ctx.service.fetch_items(batch.to_vec()).await {
                Ok(items) => items,
                Err(e) => return self.recover(e, manifest.version + 1),
            };
            let fetched = items.len();
            let (later, now): (Vec<StorageItem>, Vec<StorageItem>) =
                items.into_iter().partition(|item| {
                    self.handlers
                        .get(item.identifier.record_type)
                        .is_some_and(|h| h.should_defer(&item.record))
                });
            let processed = self.merge_batch(&mut state, &now).await?;
            tracing::info!(fetched, processed, deferred = later.len(), "merged batch");
            deferred.extend(later);
        }
        for batch in deferred.chunks(batch_size) {
            let processed = self.merge_batch(&mut state, batch).await?;
            tracing::info!(processed, "merged deferred batch");
        }

        self.finish_merge(state, &manifest, &remote, trigger).await
    }

    /// Merge the account record ahead of everything else.
    ///
    /// `Some(step)` means the merge cannot continue and the operation moves
    /// on to `step` instead.
    async fn merge_account(
        &self,
        state: &mut SyncState,
        remote: &BTreeSet<StorageIdentifier>,
        changed: Option<&StorageIdentifier>,
        version: u64,
    ) -> Result<Option<Step>> {
        if state
            .account
            .identifier
            .as_ref()
            .is_some_and(|id| remote.contains(id))
        {
            return Ok(None);
        }
        let Some(identifier) = changed else {
            tracing::warn!("remote manifest has no account record");
            state.account.change = ChangeState::Updated;
            return Ok(None);
        };
        let item = match self.ctx.service.fetch_item(identifier.clone()).await {
            Ok(item) => item,
            Err(e) => return self.recover(e, version + 1).map(Some),
        };
        let Some(item) = item else {
            tracing::warn!(identifier = %identifier, "account record missing from storage service");
            state.account.change = ChangeState::Updated;
            return Ok(None);
        };
        let Some(handler) = self.handlers.get(RecordType::Account) else {
            return Ok(None);
        };

        let db = self.ctx.db.lock().await;
        let merged =
            db.transaction(|db| handler.merge(db, state, &item.identifier, &item.record))?;
        if !merged {
            tracing::warn!(identifier = %identifier, "invalid account record");
            state.account.change = ChangeState::Updated;
        }
        db.save_sync_state(state)?;
        Ok(None)
    }

    /// Merge one batch of items in a single transaction, then persist.
    ///
    /// Items of a type without a handler are remembered as unknown.
    /// Returns the number of items merged.
    async fn merge_batch(&self, state: &mut SyncState, items: &[StorageItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let db = self.ctx.db.lock().await;
        let processed = db.transaction(|db| {
            let mut processed = 0;
            for item in items {
                let identifier = &item.identifier;
                match self.handlers.get(identifier.record_type) {
                    Some(handler) => {
                        if handler.merge(db, state, identifier, &item.record)? {
                            processed += 1;
                        }
                    }
                    None => {
                        let unknown = state
                            .unknown_identifiers
                            .entry(identifier.record_type)
                            .or_default();
                        if !unknown.contains(identifier) {
                            unknown.push(identifier.clone());
                        }
                    }
                }
            }
            Ok(processed)
        })?;
        db.save_sync_state(state)?;
        Ok(processed)
    }

    /// Record the new version, schedule invalid identifiers for deletion
    /// and re-add orphaned entities.
    async fn finish_merge(
        &self,
        mut state: SyncState,
        manifest: &Manifest,
        remote: &BTreeSet<StorageIdentifier>,
        trigger: MergeTrigger,
    ) -> Result<Step> {
        state.manifest_version = manifest.version;
        state.refetch_latest_manifest = false;
        state
            .unknown_identifiers
            .retain(|record_type, _| !self.handlers.is_known(*record_type));

        let db = self.ctx.db.lock().await;
        let mut orphans = Vec::new();
        for handler in self.handlers.iter() {
            let count = handler.restore_orphans(&db, &mut state, remote)?;
            if count > 0 {
                orphans.push((handler.record_type(), count));
            }
        }
        let known = state.all_identifiers();
        state.invalid_identifiers = remote.difference(&known).cloned().collect();
        db.save_sync_state(&state)?;
        drop(db);

        tracing::info!(
            manifest = %manifest,
            pending_updates = state.has_pending_changes(),
            invalid = state.invalid_identifiers.len(),
            unknown = state.unknown_identifier_count(),
            ?orphans,
            "finished merging manifest"
        );

        match trigger {
            MergeTrigger::Conflict => Ok(Step::Backup),
            MergeTrigger::Restore => Ok(Step::Done(Completion {
                backup_requested: state.has_pending_changes(),
            })),
        }
    }
}
