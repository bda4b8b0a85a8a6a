// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pushing local changes.

use ss_core::Manifest;

use super::{Completion, MergeTrigger, Run, Step};
use crate::error::Result;
use crate::service::ManifestUpdate;
use crate::updater::PendingChanges;

impl Run<'_> {
    /// Collect every pending change and propose the next manifest.
    ///
    /// Change states are cleared on a copy of the state, so a rejected
    /// write leaves them pending for the retry after the merge.
    pub(crate) async fn backup(&self) -> Result<Step> {
        let (mut state, changes) = {
            let db = self.ctx.db.lock().await;
            let loaded = self.load_state(&db)?;
            let mut state = loaded.clone();
            let mut changes = PendingChanges::default();
            for handler in self.handlers.iter() {
                handler.collect_changes(&db, &mut state, &mut changes)?;
            }
            if changes.is_empty() {
                if state != loaded {
                    db.save_sync_state(&state)?;
                }
                tracing::debug!("no pending changes to back up");
                return Ok(Step::Done(Completion::default()));
            }
            (state, changes)
        };

        let invalid = std::mem::take(&mut state.invalid_identifiers);
        state.manifest_version += 1;
        let manifest = Manifest::new(
            state.manifest_version,
            Some(self.ctx.device.device_id),
            state.all_identifiers(),
        );
        tracing::info!(
            manifest = %manifest,
            new = changes.items.len(),
            deleted = changes.deleted.len(),
            invalid = invalid.len(),
            total = manifest.identifiers.len(),
            "proposing manifest"
        );

        let mut deleted = changes.deleted;
        deleted.extend(invalid);
        let update = ManifestUpdate {
            manifest: manifest.clone(),
            new_items: changes.items,
            deleted_identifiers: deleted,
            delete_all_existing: false,
        };

        match self.ctx.service.update_manifest(update).await? {
            None => {
                state.consecutive_conflicts = 0;
                self.ctx.db.lock().await.save_sync_state(&state)?;
                tracing::info!(manifest = %manifest, "backup accepted");
                self.ctx.notifier.manifest_changed(&manifest);
                Ok(Step::Done(Completion::default()))
            }
            Some(conflict) => {
                tracing::info!(
                    proposed = %manifest,
                    remote = %conflict,
                    "backup conflicted, merging remote manifest"
                );
                Ok(Step::Merge {
                    manifest: conflict,
                    trigger: MergeTrigger::Conflict,
                })
            }
        }
    }
}
