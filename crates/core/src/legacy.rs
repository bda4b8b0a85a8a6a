// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Decode shim for the legacy identifier map layout.
//!
//! Older builds persisted each local-id to identifier map as a pair of
//! forward and backward dictionaries. Only the forward half carries
//! information. New code always writes the plain map, so this module can
//! be removed once no persisted state predates the plain layout.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use crate::identifier::StorageIdentifier;

#[derive(Deserialize)]
#[serde(untagged, bound(deserialize = "K: Deserialize<'de> + Ord"))]
enum IdentifierMapLayout<K> {
    Bidirectional {
        #[serde(rename = "forwardDictionary")]
        forward: BTreeMap<K, StorageIdentifier>,
    },
    Plain(BTreeMap<K, StorageIdentifier>),
}

/// Deserializes an identifier map persisted in either layout.
pub fn deserialize_identifier_map<'de, D, K>(
    deserializer: D,
) -> Result<BTreeMap<K, StorageIdentifier>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
{
    match IdentifierMapLayout::<K>::deserialize(deserializer)? {
        IdentifierMapLayout::Bidirectional { forward } => {
            tracing::debug!(entries = forward.len(), "migrated bidirectional identifier map");
            Ok(forward)
        }
        IdentifierMapLayout::Plain(map) => Ok(map),
    }
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
