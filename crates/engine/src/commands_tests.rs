// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::path::PathBuf;

use clap::Parser;
use tempfile::TempDir;

use crate::context::DeviceRole;
use crate::memory::MemoryStorageService;

struct Env {
    dir: TempDir,
    service: Arc<MemoryStorageService>,
}

impl Env {
    fn new() -> Self {
        Env {
            dir: TempDir::new().unwrap(),
            service: Arc::new(MemoryStorageService::new()),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("sync.db")
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let db = self.db_path();
        let config = self.dir.path().join("config.toml");
        let mut argv = vec![
            "ssync",
            "--db",
            db.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let service = self.service.clone();
        run_with(cli, move |_| service as Arc<dyn StorageService>).await
    }

    fn db(&self) -> Database {
        Database::open(&self.db_path()).unwrap()
    }
}

#[tokio::test]
async fn init_registers_account_and_device() {
    let env = Env::new();
    env.run(&["init", "--aci", "aci-self", "--e164", "+15550100"])
        .await
        .unwrap();

    let db = env.db();
    let account = db.get_local_account().unwrap().unwrap();
    assert_eq!(account.aci, "aci-self");
    assert_eq!(account.e164.as_deref(), Some("+15550100"));
    assert_eq!(
        DeviceIdentity::load(&db).unwrap(),
        Some(DeviceIdentity::primary())
    );
}

#[tokio::test]
async fn init_linked_device() {
    let env = Env::new();
    env.run(&["init", "--aci", "aci-self", "--linked", "3"])
        .await
        .unwrap();

    let device = DeviceIdentity::load(&env.db()).unwrap().unwrap();
    assert_eq!(device.role, DeviceRole::Linked);
    assert_eq!(device.device_id, 3);
}

#[tokio::test]
async fn sync_commands_require_init() {
    let env = Env::new();
    let err = env.run(&["restore"]).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(env.service.stats().manifest_fetches, 0);
}

#[tokio::test]
async fn status_before_init_succeeds() {
    let env = Env::new();
    env.run(&["status"]).await.unwrap();
}

#[tokio::test]
async fn contact_add_reuses_existing_contact() {
    let env = Env::new();
    env.run(&["init", "--aci", "aci-self"]).await.unwrap();
    env.run(&["contact", "add", "--aci", "aci-b", "--given-name", "Bob"])
        .await
        .unwrap();
    env.run(&["contact", "add", "--aci", "aci-b", "--given-name", "Robert"])
        .await
        .unwrap();

    let db = env.db();
    let contacts = db.list_contacts().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].given_name.as_deref(), Some("Robert"));
    let state = db.load_sync_state().unwrap();
    assert_eq!(state.contacts.pending(), vec![contacts[0].unique_id.clone()]);
}

#[tokio::test]
async fn restore_then_backup() {
    let env = Env::new();
    env.run(&["init", "--aci", "aci-self"]).await.unwrap();
    env.run(&["contact", "add", "--aci", "aci-b"]).await.unwrap();

    env.run(&["restore"]).await.unwrap();
    assert_eq!(env.service.manifest().unwrap().version, 1);
    assert_eq!(env.service.item_count(), 2);

    env.run(&["contact", "add", "--aci", "aci-c"]).await.unwrap();
    env.run(&["backup"]).await.unwrap();
    assert_eq!(env.service.manifest().unwrap().version, 2);
    assert_eq!(env.service.item_count(), 3);

    env.run(&["status"]).await.unwrap();
    let state = env.db().load_sync_state().unwrap();
    assert!(!state.has_pending_changes());
}

#[tokio::test]
async fn cleanup_and_reset() {
    let env = Env::new();
    env.run(&["init", "--aci", "aci-self"]).await.unwrap();
    env.run(&["restore"]).await.unwrap();
    env.run(&["cleanup"]).await.unwrap();
    assert_eq!(env.db().load_sync_state().unwrap().manifest_version, 1);

    env.run(&["reset"]).await.unwrap();
    assert_eq!(env.db().load_sync_state().unwrap().manifest_version, 0);
}
