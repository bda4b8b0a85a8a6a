// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending local mutations.
//!
//! Callers report changed entities as they happen. The ids are collected
//! into sets, so reporting the same entity twice before a flush is the
//! same as reporting it once. Persisting folds the sets into the sync
//! state as `Updated` change states.

use std::collections::BTreeSet;

use ss_core::{ByteKey, Database, SyncState};

/// A contact reported by service id rather than recipient id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceId {
    Aci(String),
    Pni(String),
}

impl ServiceId {
    fn as_str(&self) -> &str {
        match self {
            ServiceId::Aci(id) | ServiceId::Pni(id) => id,
        }
    }

    fn is_pni(&self) -> bool {
        matches!(self, ServiceId::Pni(_))
    }
}

/// Entities changed locally since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMutations {
    pub local_account: bool,
    pub recipients: BTreeSet<String>,
    pub service_ids: BTreeSet<ServiceId>,
    pub groups_v1: BTreeSet<ByteKey>,
    pub groups_v2: BTreeSet<ByteKey>,
    pub distribution_lists: BTreeSet<ByteKey>,
    pub call_links: BTreeSet<ByteKey>,
}

impl PendingMutations {
    pub fn has_changes(&self) -> bool {
        self.local_account
            || !self.recipients.is_empty()
            || !self.service_ids.is_empty()
            || !self.groups_v1.is_empty()
            || !self.groups_v2.is_empty()
            || !self.distribution_lists.is_empty()
            || !self.call_links.is_empty()
    }

    /// Fold `other` into this set.
    pub fn extend(&mut self, other: PendingMutations) {
        self.local_account |= other.local_account;
        self.recipients.extend(other.recipients);
        self.service_ids.extend(other.service_ids);
        self.groups_v1.extend(other.groups_v1);
        self.groups_v2.extend(other.groups_v2);
        self.distribution_lists.extend(other.distribution_lists);
        self.call_links.extend(other.call_links);
    }

    /// Mark every recorded entity as updated in `state`.
    ///
    /// Service ids are resolved to recipients first, creating a recipient
    /// when none exists yet. Call links are dropped unless this build
    /// syncs them.
    pub fn apply(
        self,
        db: &Database,
        state: &mut SyncState,
        call_link_sync: bool,
    ) -> ss_core::Result<()> {
        tracing::info!(
            local_account = self.local_account,
            recipients = self.recipients.len(),
            service_ids = self.service_ids.len(),
            groups_v1 = self.groups_v1.len(),
            groups_v2 = self.groups_v2.len(),
            distribution_lists = self.distribution_lists.len(),
            call_links = self.call_links.len(),
            "recording pending mutations"
        );

        if self.local_account {
            state.account.change = ss_core::ChangeState::Updated;
        }
        for id in self.recipients {
            state.contacts.mark_updated(id);
        }
        for service_id in &self.service_ids {
            let contact = db.fetch_or_create_contact(service_id.as_str(), service_id.is_pni())?;
            state.contacts.mark_updated(contact.unique_id);
        }
        for id in self.groups_v1 {
            state.groups_v1.mark_updated(id);
        }
        for key in self.groups_v2 {
            state.groups_v2.mark_updated(key);
        }
        for id in self.distribution_lists {
            state.distribution_lists.mark_updated(id);
        }
        if call_link_sync {
            for key in self.call_links {
                state.call_links.mark_updated(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mutations_tests.rs"]
mod tests;
