// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Storage identifiers and record types.
//!
//! A [`StorageIdentifier`] is the opaque, typed handle of one record in the
//! remote store. Keys are content addressed and never reused: every rewrite
//! of a record gets a fresh identifier.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length in bytes of a freshly generated storage key.
pub const STORAGE_KEY_LEN: usize = 16;

/// Record type tag carried by every storage identifier.
///
/// Numeric values match the remote store's wire values. Types this build
/// does not know about are kept as [`RecordType::Other`] so they round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum RecordType {
    Contact,
    GroupV1,
    GroupV2,
    Account,
    StoryDistributionList,
    CallLink,
    Other(u32),
}

impl RecordType {
    /// All record types this build can parse, in merge order.
    pub const KNOWN: [RecordType; 6] = [
        RecordType::Account,
        RecordType::Contact,
        RecordType::GroupV1,
        RecordType::GroupV2,
        RecordType::StoryDistributionList,
        RecordType::CallLink,
    ];

    /// Returns the numeric wire value.
    pub fn as_u32(&self) -> u32 {
        match self {
            RecordType::Contact => 1,
            RecordType::GroupV1 => 2,
            RecordType::GroupV2 => 3,
            RecordType::Account => 4,
            RecordType::StoryDistributionList => 5,
            RecordType::CallLink => 7,
            RecordType::Other(value) => *value,
        }
    }

    /// Returns the name used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Contact => "contact",
            RecordType::GroupV1 => "group-v1",
            RecordType::GroupV2 => "group-v2",
            RecordType::Account => "account",
            RecordType::StoryDistributionList => "distribution-list",
            RecordType::CallLink => "call-link",
            RecordType::Other(_) => "other",
        }
    }
}

impl From<u32> for RecordType {
    fn from(value: u32) -> Self {
        match value {
            1 => RecordType::Contact,
            2 => RecordType::GroupV1,
            3 => RecordType::GroupV2,
            4 => RecordType::Account,
            5 => RecordType::StoryDistributionList,
            7 => RecordType::CallLink,
            other => RecordType::Other(other),
        }
    }
}

impl From<RecordType> for u32 {
    fn from(value: RecordType) -> Self {
        value.as_u32()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Other(value) => write!(f, "other({value})"),
            known => write!(f, "{}", known.as_str()),
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "contact" => Ok(RecordType::Contact),
            "group-v1" | "groupv1" => Ok(RecordType::GroupV1),
            "group-v2" | "groupv2" => Ok(RecordType::GroupV2),
            "account" => Ok(RecordType::Account),
            "distribution-list" | "story-distribution-list" => {
                Ok(RecordType::StoryDistributionList)
            }
            "call-link" | "calllink" => Ok(RecordType::CallLink),
            other => other
                .parse::<u32>()
                .map(RecordType::from)
                .map_err(|_| Error::InvalidRecordType(s.to_string())),
        }
    }
}

/// Opaque byte string, hex encoded in JSON and stored as a blob in SQLite.
///
/// Used for storage keys as well as the 16/32 byte local ids of groups,
/// distribution lists and call links.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteKey(pub Vec<u8>);

impl ByteKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ByteKey(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parses a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(ByteKey)
            .map_err(|e| Error::InvalidKey(format!("'{s}': {e}")))
    }

    /// Generates `len` random bytes.
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::Rng::fill(&mut rand::thread_rng(), bytes.as_mut_slice());
        ByteKey(bytes)
    }
}

impl fmt::Display for ByteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ByteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ByteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(ByteKey)
            .map_err(serde::de::Error::custom)
    }
}

impl ToSql for ByteKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_slice()))
    }
}

impl FromSql for ByteKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_blob().map(|b| ByteKey(b.to_vec()))
    }
}

/// Typed handle to one record in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageIdentifier {
    pub key: ByteKey,
    #[serde(rename = "type")]
    pub record_type: RecordType,
}

impl StorageIdentifier {
    pub fn new(key: ByteKey, record_type: RecordType) -> Self {
        StorageIdentifier { key, record_type }
    }

    /// Generates a fresh identifier for a record payload.
    ///
    /// The key is SHA-256 over a random nonce and the payload, truncated to
    /// [`STORAGE_KEY_LEN`] bytes.
    pub fn generate(record_type: RecordType, payload: &[u8]) -> Self {
        let nonce: [u8; 16] = rand::random();
        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(payload);
        let digest = hasher.finalize();
        StorageIdentifier {
            key: ByteKey(digest[..STORAGE_KEY_LEN].to_vec()),
            record_type,
        }
    }
}

impl fmt::Display for StorageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.key)
    }
}

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod tests;
