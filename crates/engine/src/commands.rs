// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ss_core::{Contact, Database, LocalAccount};

use crate::cli::{Cli, Command, ContactCommand};
use crate::client::RemoteStorageClient;
use crate::config::{default_config_path, default_db_path, SyncConfig};
use crate::context::{DeviceIdentity, SyncContext};
use crate::error::{Result, SyncError};
use crate::mutations::PendingMutations;
use crate::scheduler::{SyncManager, SyncOutcome};
use crate::service::StorageService;

/// Execute a CLI command against the configured storage service.
pub async fn run(cli: Cli) -> Result<()> {
    run_with(cli, |config| Arc::new(RemoteStorageClient::new(config.clone()))).await
}

pub(crate) async fn run_with(
    cli: Cli,
    connect: impl FnOnce(&SyncConfig) -> Arc<dyn StorageService>,
) -> Result<()> {
    let config = match cli.config.or_else(default_config_path) {
        Some(path) => SyncConfig::load_or_default(&path)?,
        None => SyncConfig::default(),
    };
    let db_path = cli
        .db
        .or_else(default_db_path)
        .ok_or_else(|| SyncError::Config("no data directory found, pass --db".to_string()))?;
    let db = open_db(&db_path)?;

    match cli.command {
        Command::Init {
            aci,
            pni,
            e164,
            linked,
        } => init(&db, aci, pni, e164, linked),
        Command::Status => status(&db),
        Command::Contact {
            command:
                ContactCommand::Add {
                    aci,
                    given_name,
                    family_name,
                },
        } => add_contact(&db, &aci, given_name, family_name),
        command => {
            let device = DeviceIdentity::load(&db)?.ok_or_else(|| {
                SyncError::Config("device not initialized, run `ssync init`".to_string())
            })?;
            let service = connect(&config);
            let manager = SyncManager::new(SyncContext::new(db, service, device, config));
            sync(&manager, command).await
        }
    }
}

fn open_db(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

fn init(
    db: &Database,
    aci: String,
    pni: Option<String>,
    e164: Option<String>,
    linked: Option<u32>,
) -> Result<()> {
    let mut account = db
        .get_local_account()?
        .unwrap_or_else(|| LocalAccount::new(aci.clone()));
    account.aci = aci;
    account.pni = pni;
    account.e164 = e164;
    let device = match linked {
        Some(id) => DeviceIdentity::linked(id),
        None => DeviceIdentity::primary(),
    };

    db.transaction(|db| {
        db.set_local_account(&account)?;
        device.save(db)
    })?;
    println!(
        "Initialized {} as {:?} device {}",
        account.aci, device.role, device.device_id
    );
    Ok(())
}

fn status(db: &Database) -> Result<()> {
    let Some(account) = db.get_local_account()? else {
        println!("Not initialized");
        return Ok(());
    };
    let device = DeviceIdentity::load(db)?.unwrap_or_else(DeviceIdentity::primary);
    let state = db.load_sync_state()?;

    println!("Account:   {}", account.aci);
    println!("Device:    {:?} {}", device.role, device.device_id);
    println!("Manifest:  v{}", state.manifest_version);
    println!(
        "Pending:   account={} contacts={} groups_v1={} groups_v2={} lists={} call_links={}",
        state.account.change.is_pending(),
        state.contacts.pending().len(),
        state.groups_v1.pending().len(),
        state.groups_v2.pending().len(),
        state.distribution_lists.pending().len(),
        state.call_links.pending().len(),
    );
    println!("Unknown:   {}", state.unknown_identifier_count());
    println!("Invalid:   {}", state.invalid_identifiers.len());
    if state.consecutive_conflicts > 0 {
        println!("Conflicts: {}", state.consecutive_conflicts);
    }
    Ok(())
}

fn add_contact(
    db: &Database,
    aci: &str,
    given_name: Option<String>,
    family_name: Option<String>,
) -> Result<()> {
    db.transaction(|db| {
        let mut contact = db
            .find_contact_by_aci(aci)?
            .unwrap_or_else(|| Contact::new(Contact::generate_unique_id()));
        contact.aci = Some(aci.to_string());
        contact.given_name = given_name;
        contact.family_name = family_name;
        db.upsert_contact(&contact)?;

        let mut state = db.load_sync_state()?;
        let mutations = PendingMutations {
            recipients: [contact.unique_id.clone()].into_iter().collect(),
            ..Default::default()
        };
        mutations.apply(db, &mut state, true)?;
        db.save_sync_state(&state)?;
        println!("Added contact {} ({})", contact.unique_id, aci);
        Ok(())
    })?;
    Ok(())
}

async fn sync(manager: &SyncManager, command: Command) -> Result<()> {
    match command {
        Command::Restore => settle(manager.restore_or_create().await)?,
        Command::Backup => settle(manager.backup_pending_changes_and_wait().await)?,
        Command::Cleanup => {
            let purged = manager.clean_up_deleted_call_links().await?;
            if purged > 0 {
                println!("Purged {} deleted call links", purged);
            }
            manager.flush_mutations();
            manager.clean_up_unknown_data();
            settle(manager.backup_pending_changes_and_wait().await)?;
        }
        Command::Reset => {
            manager.reset_local_data().await?;
            println!("Sync state reset");
            return Ok(());
        }
        Command::Init { .. } | Command::Status | Command::Contact { .. } => return Ok(()),
    }

    let state = manager.context().db.lock().await.load_sync_state()?;
    println!("Synced at manifest v{}", state.manifest_version);
    Ok(())
}

fn settle(outcome: SyncOutcome) -> Result<()> {
    outcome.map_err(|e| Arc::try_unwrap(e).unwrap_or_else(SyncError::Shared))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
