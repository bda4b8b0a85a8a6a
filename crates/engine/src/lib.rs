// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ssync - Storage service synchronization engine.
//!
//! Keeps a device's local social graph (account, contacts, groups,
//! story distribution lists, call links) in step with an encrypted
//! remote key-value store shared by all of the account's devices.
//!
//! # Main Components
//!
//! - [`SyncManager`] - queues, coalesces and runs sync operations
//! - [`SyncOperation`] - one backup, restore-or-create or clean-up run
//! - [`StorageService`] - the remote store, with a WebSocket client
//!   ([`RemoteStorageClient`]) and an in-memory one ([`MemoryStorageService`])
//! - [`updater`] - per-kind record builders and mergers
//! - [`SyncConfig`] - TOML configuration
//!
//! ```rust,ignore
//! let ctx = SyncContext::new(db, Arc::new(RemoteStorageClient::new(config.clone())),
//!     DeviceIdentity::primary(), config);
//! let manager = SyncManager::new(ctx);
//! manager.restore_or_create().await?;
//! manager.record_pending_recipients(["recipient-id"]);
//! ```

mod cli;
pub mod client;
mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod mutations;
pub mod operation;
pub mod scheduler;
pub mod service;
pub mod transport;
pub mod updater;

pub use cli::{Cli, Command, ContactCommand};
pub use client::RemoteStorageClient;
pub use commands::run;
pub use config::SyncConfig;
pub use context::{
    DeviceIdentity, DeviceNotifier, DeviceRole, KeyStore, LoggingNotifier, MemoryKeyStore,
    SyncContext,
};
pub use error::{Result, StorageError, SyncError};
pub use memory::MemoryStorageService;
pub use mutations::{PendingMutations, ServiceId};
pub use operation::{Completion, OperationMode, SyncOperation};
pub use scheduler::{SyncManager, SyncOutcome};
pub use service::{ManifestFetch, ManifestUpdate, StorageService};
