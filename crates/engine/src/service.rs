// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The storage service interface.
//!
//! Implemented by [`crate::client::RemoteStorageClient`] over WebSocket and
//! by [`crate::memory::MemoryStorageService`] for tests and offline use.

use std::future::Future;
use std::pin::Pin;

use ss_core::{Manifest, StorageIdentifier, StorageItem};

use crate::error::StorageError;

/// Boxed future returned by storage service calls.
pub type ServiceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Outcome of a manifest fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestFetch {
    /// Nothing was ever written.
    NoExistingManifest,
    /// The remote manifest is not newer than the requested version.
    NoNewerManifest,
    Latest(Manifest),
}

/// A proposed manifest write.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestUpdate {
    pub manifest: Manifest,
    pub new_items: Vec<StorageItem>,
    pub deleted_identifiers: Vec<StorageIdentifier>,
    /// Delete every existing record before applying this update.
    pub delete_all_existing: bool,
}

impl ManifestUpdate {
    pub fn new(manifest: Manifest) -> Self {
        ManifestUpdate {
            manifest,
            new_items: Vec::new(),
            deleted_identifiers: Vec::new(),
            delete_all_existing: false,
        }
    }
}

/// Remote record store with optimistic concurrency on manifest versions.
pub trait StorageService: Send + Sync {
    /// Fetch the latest manifest, or learn that none newer than
    /// `greater_than` exists.
    fn fetch_latest_manifest(&self, greater_than: Option<u64>) -> ServiceFuture<'_, ManifestFetch>;

    /// Fetch records by identifier. Identifiers the service does not know
    /// are omitted from the result.
    fn fetch_items(&self, identifiers: Vec<StorageIdentifier>) -> ServiceFuture<'_, Vec<StorageItem>>;

    /// Fetch a single record.
    fn fetch_item(&self, identifier: StorageIdentifier) -> ServiceFuture<'_, Option<StorageItem>> {
        Box::pin(async move {
            let items = self.fetch_items(vec![identifier]).await?;
            Ok(items.into_iter().next())
        })
    }

    /// Propose a new manifest.
    ///
    /// Returns `None` when accepted, or the current remote manifest when the
    /// proposal conflicts with a newer write.
    fn update_manifest(&self, update: ManifestUpdate) -> ServiceFuture<'_, Option<Manifest>>;
}
