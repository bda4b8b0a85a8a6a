// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators shared by every sync operation.
//!
//! [`SyncContext`] is built once at startup and handed to the scheduler.
//! It carries the local database, the storage service, the key store and
//! the linked-device notifier; nothing is looked up globally.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ss_core::db::SYNC_COLLECTION;
use ss_core::{Database, Manifest};
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::operation::migration::UnknownFieldMigration;
use crate::service::StorageService;

const DEVICE_KEY: &str = "device";

/// Source of the storage service key.
pub trait KeyStore: Send + Sync {
    fn is_key_available(&self) -> bool;

    /// Forget the key after it failed to decrypt remote data.
    fn clear_key(&self);
}

/// Outbound messages to this account's other devices.
pub trait DeviceNotifier: Send + Sync {
    /// A new manifest was written; linked devices should fetch it.
    fn manifest_changed(&self, manifest: &Manifest);

    /// Ask the primary device to send the current storage key.
    fn request_keys(&self);
}

/// Key store holding only an availability flag.
#[derive(Debug)]
pub struct MemoryKeyStore {
    available: AtomicBool,
}

impl MemoryKeyStore {
    pub fn new(available: bool) -> Self {
        MemoryKeyStore {
            available: AtomicBool::new(available),
        }
    }

    /// Mark the key as (re)delivered.
    pub fn set_key_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl KeyStore for MemoryKeyStore {
    fn is_key_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn clear_key(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}

/// Notifier that only logs.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

impl DeviceNotifier for LoggingNotifier {
    fn manifest_changed(&self, manifest: &Manifest) {
        tracing::info!(manifest = %manifest, "notifying linked devices of new manifest");
    }

    fn request_keys(&self) {
        tracing::info!("requesting storage key from primary device");
    }
}

/// Notifier that counts what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    manifests: std::sync::Mutex<Vec<u64>>,
    key_requests: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions of every announced manifest, oldest first.
    pub fn announced_versions(&self) -> Vec<u64> {
        self.manifests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn key_requests(&self) -> usize {
        self.key_requests.load(Ordering::SeqCst)
    }
}

impl DeviceNotifier for RecordingNotifier {
    fn manifest_changed(&self, manifest: &Manifest) {
        self.manifests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(manifest.version);
    }

    fn request_keys(&self) {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Whether this device owns the canonical sync key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    #[default]
    Primary,
    Linked,
}

impl DeviceRole {
    pub fn is_primary(&self) -> bool {
        matches!(self, DeviceRole::Primary)
    }
}

/// This device's place within the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub role: DeviceRole,
    /// Recorded as the source device of every manifest this device writes.
    pub device_id: u32,
}

impl DeviceIdentity {
    pub fn primary() -> Self {
        DeviceIdentity {
            role: DeviceRole::Primary,
            device_id: 1,
        }
    }

    pub fn linked(device_id: u32) -> Self {
        DeviceIdentity {
            role: DeviceRole::Linked,
            device_id,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.role.is_primary()
    }

    pub fn load(db: &Database) -> ss_core::Result<Option<Self>> {
        db.kv_get(SYNC_COLLECTION, DEVICE_KEY)
    }

    pub fn save(&self, db: &Database) -> ss_core::Result<()> {
        db.kv_set(SYNC_COLLECTION, DEVICE_KEY, self)
    }
}

/// Everything a sync operation needs.
#[derive(Clone)]
pub struct SyncContext {
    pub db: Arc<Mutex<Database>>,
    pub service: Arc<dyn StorageService>,
    pub keys: Arc<dyn KeyStore>,
    pub notifier: Arc<dyn DeviceNotifier>,
    pub device: DeviceIdentity,
    pub config: SyncConfig,
    /// Cached records with unknown fields are re-merged once per version.
    pub app_version: String,
    pub migrations: Vec<Arc<dyn UnknownFieldMigration>>,
}

impl SyncContext {
    pub fn new(
        db: Database,
        service: Arc<dyn StorageService>,
        device: DeviceIdentity,
        config: SyncConfig,
    ) -> Self {
        SyncContext {
            db: Arc::new(Mutex::new(db)),
            service,
            keys: Arc::new(MemoryKeyStore::default()),
            notifier: Arc::new(LoggingNotifier),
            device,
            config,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            migrations: Vec::new(),
        }
    }

    pub fn with_keys(mut self, keys: Arc<dyn KeyStore>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn DeviceNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_migration(mut self, migration: Arc<dyn UnknownFieldMigration>) -> Self {
        self.migrations.push(migration);
        self
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
