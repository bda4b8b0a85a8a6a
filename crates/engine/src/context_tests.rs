// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::memory::MemoryStorageService;

#[test]
fn memory_key_store_clear_and_restore() {
    let keys = MemoryKeyStore::default();
    assert!(keys.is_key_available());

    keys.clear_key();
    assert!(!keys.is_key_available());

    keys.set_key_available(true);
    assert!(keys.is_key_available());
}

#[test]
fn recording_notifier_counts() {
    let notifier = RecordingNotifier::new();
    notifier.manifest_changed(&Manifest::new(3, Some(1), vec![]));
    notifier.manifest_changed(&Manifest::new(4, Some(1), vec![]));
    notifier.request_keys();

    assert_eq!(notifier.announced_versions(), vec![3, 4]);
    assert_eq!(notifier.key_requests(), 1);
}

#[test]
fn device_identity_persists() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(DeviceIdentity::load(&db).unwrap(), None);

    let device = DeviceIdentity::linked(3);
    device.save(&db).unwrap();

    let loaded = DeviceIdentity::load(&db).unwrap().unwrap();
    assert_eq!(loaded, device);
    assert!(!loaded.is_primary());
}

#[test]
fn device_identity_survives_sync_state_reset() {
    let db = Database::open_in_memory().unwrap();
    DeviceIdentity::primary().save(&db).unwrap();
    db.reset_sync_state().unwrap();
    assert!(DeviceIdentity::load(&db).unwrap().unwrap().is_primary());
}

#[test]
fn device_role_serializes_snake_case() {
    let json = serde_json::to_string(&DeviceIdentity::linked(2)).unwrap();
    assert_eq!(json, r#"{"role":"linked","device_id":2}"#);
}

#[test]
fn context_builder_overrides_defaults() {
    let service = Arc::new(MemoryStorageService::new());
    let keys = Arc::new(MemoryKeyStore::new(false));
    let ctx = SyncContext::new(
        Database::open_in_memory().unwrap(),
        service,
        DeviceIdentity::primary(),
        SyncConfig::default(),
    )
    .with_keys(keys)
    .with_app_version("9.9.9");

    assert!(!ctx.keys.is_key_available());
    assert_eq!(ctx.app_version, "9.9.9");
    assert!(ctx.migrations.is_empty());
}
