// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned manifests.
//!
//! A [`Manifest`] names the complete authoritative set of live records at
//! one version. The remote store only understands its version; the rest is
//! opaque bytes produced by [`Manifest::encode`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::Result;
use crate::identifier::{RecordType, StorageIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    /// Device id of the writer, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device: Option<u32>,
    #[serde(default)]
    pub identifiers: Vec<StorageIdentifier>,
}

impl Manifest {
    /// Builds a manifest, dropping duplicate identifiers.
    pub fn new(
        version: u64,
        source_device: Option<u32>,
        identifiers: impl IntoIterator<Item = StorageIdentifier>,
    ) -> Self {
        let unique: BTreeSet<StorageIdentifier> = identifiers.into_iter().collect();
        Manifest {
            version,
            source_device,
            identifiers: unique.into_iter().collect(),
        }
    }

    pub fn identifier_set(&self) -> BTreeSet<StorageIdentifier> {
        self.identifiers.iter().cloned().collect()
    }

    pub fn identifiers_by_type(&self) -> BTreeMap<RecordType, Vec<StorageIdentifier>> {
        let mut grouped: BTreeMap<RecordType, Vec<StorageIdentifier>> = BTreeMap::new();
        for id in &self.identifiers {
            grouped.entry(id.record_type).or_default().push(id.clone());
        }
        grouped
    }

    pub fn contains(&self, id: &StorageIdentifier) -> bool {
        self.identifiers.contains(id)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Short form used in logs: `v<version>.<device>`.
    pub fn log_description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_device {
            Some(device) => write!(f, "v{}.{}", self.version, device),
            None => write!(f, "v{}", self.version),
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
