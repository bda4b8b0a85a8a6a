// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between a sync client and a storage server.
//!
//! The protocol is strictly request/response:
//! - Client asks for the manifest, for items, or proposes a new manifest
//! - Server answers each request with exactly one message
//!
//! Manifest and item values are opaque to the server. Only the manifest
//! version is visible, since writes are accepted by version.

use serde::{Deserialize, Serialize};

use crate::identifier::ByteKey;

/// Hex encoding for opaque byte payloads.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// A manifest as the server sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireManifest {
    pub version: u64,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

/// One stored item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireItem {
    pub key: ByteKey,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the current manifest.
    ///
    /// With `greater_than` set, the server answers `NoNewerManifest` unless
    /// its version is strictly greater.
    FetchManifest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        greater_than: Option<u64>,
    },

    /// Request items by key. Unknown keys are silently omitted.
    FetchItems { keys: Vec<ByteKey> },

    /// Propose a new manifest along with item changes.
    UpdateManifest {
        manifest: WireManifest,
        #[serde(default)]
        insert: Vec<WireItem>,
        #[serde(default)]
        delete: Vec<ByteKey>,
        /// Wipe every existing item before applying the insertions.
        #[serde(default)]
        delete_all: bool,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// No manifest has ever been written.
    NoExistingManifest,

    /// The stored manifest is not newer than the requested version.
    NoNewerManifest,

    /// The current manifest.
    Manifest { manifest: WireManifest },

    /// Response to FetchItems.
    Items { items: Vec<WireItem> },

    /// The proposed manifest was written.
    Accepted { version: u64 },

    /// The proposed manifest was rejected; this is the current one.
    Conflict { manifest: WireManifest },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    /// Creates a FetchManifest message.
    pub fn fetch_manifest(greater_than: Option<u64>) -> Self {
        ClientMessage::FetchManifest { greater_than }
    }

    /// Creates a FetchItems message.
    pub fn fetch_items(keys: Vec<ByteKey>) -> Self {
        ClientMessage::FetchItems { keys }
    }

    /// Creates an UpdateManifest message.
    pub fn update_manifest(
        manifest: WireManifest,
        insert: Vec<WireItem>,
        delete: Vec<ByteKey>,
        delete_all: bool,
    ) -> Self {
        ClientMessage::UpdateManifest {
            manifest,
            insert,
            delete,
            delete_all,
        }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Manifest message.
    pub fn manifest(manifest: WireManifest) -> Self {
        ServerMessage::Manifest { manifest }
    }

    /// Creates an Items message.
    pub fn items(items: Vec<WireItem>) -> Self {
        ServerMessage::Items { items }
    }

    /// Creates an Accepted message.
    pub fn accepted(version: u64) -> Self {
        ServerMessage::Accepted { version }
    }

    /// Creates a Conflict message.
    pub fn conflict(manifest: WireManifest) -> Self {
        ServerMessage::Conflict { manifest }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
