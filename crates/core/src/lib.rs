// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ss-core: Shared library for the storage service sync engine
//!
//! This crate provides the data model (storage identifiers, manifests,
//! records, persisted sync state), the SQLite local store, and the wire
//! protocol used by both the `ssync` engine and the `ss-remote` server.

pub mod db;
pub mod error;
pub mod identifier;
mod legacy;
pub mod local;
pub mod manifest;
pub mod protocol;
pub mod record;
pub mod state;

pub use db::Database;
pub use error::{Error, Result};
pub use identifier::{ByteKey, RecordType, StorageIdentifier};
pub use local::{CallLink, Contact, DistributionList, GroupV1, GroupV2, LocalAccount};
pub use manifest::Manifest;
pub use record::{
    AccountRecord, CallLinkRecord, ContactRecord, GroupV1Record, GroupV2Record, Record,
    StorageItem, StoryDistributionListRecord, UnknownFields,
};
pub use state::{AccountEntry, ChangeState, EntityTable, SyncState};
