// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory storage service.
//!
//! Applies the same optimistic-concurrency rule as the remote server: a
//! write is accepted when nothing was written yet or when it proposes
//! exactly the next version. Records are kept encoded, so everything that
//! passes through it is really serialized and parsed again.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use ss_core::{ByteKey, Manifest, Record, StorageIdentifier, StorageItem};

use crate::error::StorageError;
use crate::service::{ManifestFetch, ManifestUpdate, ServiceFuture, StorageService};

/// A failure to inject into the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next call of any kind fails with a network error.
    Network,
    /// Next manifest fetch that would return a manifest fails to decrypt.
    ManifestDecryption,
    /// Next manifest fetch that would return a manifest fails to parse.
    ManifestDeserialization,
    /// Next item fetch fails to decrypt.
    ItemDecryption,
    /// Next item fetch fails to parse.
    ItemDeserialization,
}

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub manifest_fetches: usize,
    pub item_fetches: usize,
    pub items_fetched: usize,
    pub update_attempts: usize,
    pub accepted_updates: usize,
}

#[derive(Default)]
struct Inner {
    manifest: Option<Manifest>,
    items: BTreeMap<ByteKey, Vec<u8>>,
    faults: VecDeque<Fault>,
    stats: ServiceStats,
}

impl Inner {
    fn take_fault(&mut self, accept: impl Fn(Fault) -> bool) -> Option<Fault> {
        let index = self.faults.iter().position(|f| accept(*f))?;
        self.faults.remove(index)
    }
}

/// Storage service held entirely in memory.
#[derive(Default)]
pub struct MemoryStorageService {
    inner: Mutex<Inner>,
}

impl MemoryStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a failure for the next matching call.
    pub fn inject_fault(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    pub fn stats(&self) -> ServiceStats {
        self.lock().stats
    }

    /// The current manifest.
    pub fn manifest(&self) -> Option<Manifest> {
        self.lock().manifest.clone()
    }

    pub fn item_count(&self) -> usize {
        self.lock().items.len()
    }

    /// Decode the stored record for an identifier.
    pub fn record(&self, identifier: &StorageIdentifier) -> Option<Record> {
        let inner = self.lock();
        let bytes = inner.items.get(&identifier.key)?;
        Record::decode(identifier.record_type, bytes).ok()
    }

    /// Store raw record bytes, bypassing the manifest.
    pub fn put_raw_item(&self, key: ByteKey, bytes: Vec<u8>) {
        self.lock().items.insert(key, bytes);
    }

    /// Replace the manifest without any version check.
    pub fn force_manifest(&self, manifest: Manifest) {
        self.lock().manifest = Some(manifest);
    }
}

impl StorageService for MemoryStorageService {
    fn fetch_latest_manifest(&self, greater_than: Option<u64>) -> ServiceFuture<'_, ManifestFetch> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.stats.manifest_fetches += 1;
            if inner.take_fault(|f| f == Fault::Network).is_some() {
                return Err(StorageError::Network("injected".into()));
            }
            let Some(manifest) = inner.manifest.clone() else {
                return Ok(ManifestFetch::NoExistingManifest);
            };
            if greater_than.is_some_and(|version| manifest.version <= version) {
                return Ok(ManifestFetch::NoNewerManifest);
            }
            let fault = inner.take_fault(|f| {
                matches!(f, Fault::ManifestDecryption | Fault::ManifestDeserialization)
            });
            match fault {
                Some(Fault::ManifestDecryption) => Err(StorageError::ManifestDecryptionFailed {
                    version: manifest.version,
                }),
                Some(_) => Err(StorageError::ManifestDeserializationFailed {
                    version: manifest.version,
                }),
                None => Ok(ManifestFetch::Latest(manifest)),
            }
        })
    }

    fn fetch_items(&self, identifiers: Vec<StorageIdentifier>) -> ServiceFuture<'_, Vec<StorageItem>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.stats.item_fetches += 1;
            let fault = inner.take_fault(|f| {
                matches!(
                    f,
                    Fault::Network | Fault::ItemDecryption | Fault::ItemDeserialization
                )
            });
            match fault {
                Some(Fault::Network) => return Err(StorageError::Network("injected".into())),
                Some(Fault::ItemDecryption) => return Err(StorageError::ItemDecryptionFailed),
                Some(_) => return Err(StorageError::ItemDeserializationFailed),
                None => {}
            }

            let mut items = Vec::with_capacity(identifiers.len());
            for identifier in identifiers {
                let Some(bytes) = inner.items.get(&identifier.key) else {
                    continue;
                };
                let record = Record::decode(identifier.record_type, bytes)
                    .map_err(|_| StorageError::ItemDeserializationFailed)?;
                items.push(StorageItem::new(identifier, record));
            }
            inner.stats.items_fetched += items.len();
            Ok(items)
        })
    }

    fn update_manifest(&self, update: ManifestUpdate) -> ServiceFuture<'_, Option<Manifest>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.stats.update_attempts += 1;
            if inner.take_fault(|f| f == Fault::Network).is_some() {
                return Err(StorageError::Network("injected".into()));
            }

            if let Some(current) = &inner.manifest {
                if update.manifest.version != current.version + 1 {
                    return Ok(Some(current.clone()));
                }
            }

            let mut encoded = Vec::with_capacity(update.new_items.len());
            for item in &update.new_items {
                let bytes = item
                    .record
                    .encode()
                    .map_err(|e| StorageError::Rejected(e.to_string()))?;
                encoded.push((item.identifier.key.clone(), bytes));
            }

            if update.delete_all_existing {
                inner.items.clear();
            }
            for identifier in &update.deleted_identifiers {
                inner.items.remove(&identifier.key);
            }
            inner.items.extend(encoded);
            inner.manifest = Some(update.manifest);
            inner.stats.accepted_updates += 1;
            Ok(None)
        })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
