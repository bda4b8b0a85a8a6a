// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Storage service client over WebSocket.
//!
//! Provides [`RemoteStorageClient`], the [`StorageService`] implementation
//! that talks to an `ss-remote` server:
//! - Lazy connection with exponential backoff
//! - One request in flight at a time, bounded by a timeout
//! - Manifest and record decoding, with parse failures reported as
//!   deserialization errors

use std::collections::BTreeMap;
use std::time::Duration;

use ss_core::protocol::{ClientMessage, ServerMessage, WireItem, WireManifest};
use ss_core::{ByteKey, Manifest, Record, StorageIdentifier, StorageItem};
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::error::StorageError;
use crate::service::{ManifestFetch, ManifestUpdate, ServiceFuture, StorageService};
use crate::transport::{Transport, WebSocketTransport};

/// Storage service client for a remote server.
pub struct RemoteStorageClient<T: Transport = WebSocketTransport> {
    config: SyncConfig,
    transport: Mutex<T>,
}

impl RemoteStorageClient<WebSocketTransport> {
    /// Create a client with the default WebSocket transport.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_transport(config, WebSocketTransport::new())
    }
}

impl<T: Transport> RemoteStorageClient<T> {
    /// Create a client with a custom transport (for testing).
    pub fn with_transport(config: SyncConfig, transport: T) -> Self {
        RemoteStorageClient {
            config,
            transport: Mutex::new(transport),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    pub async fn disconnect(&self) -> Result<(), StorageError> {
        self.transport.lock().await.disconnect().await?;
        Ok(())
    }

    /// Connect with exponential backoff retry.
    async fn connect_with_retry(&self, transport: &mut T) -> Result<(), StorageError> {
        let mut attempt = 0;
        let mut delay_ms = self.config.initial_delay_ms;

        loop {
            attempt += 1;
            match transport.connect(&self.config.url).await {
                Ok(()) => {
                    tracing::debug!(url = %self.config.url, attempt, "connected to storage service");
                    return Ok(());
                }
                Err(e) if attempt >= self.config.max_retries.max(1) => {
                    return Err(StorageError::Network(format!(
                        "giving up after {attempt} attempts: {e}"
                    )));
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "connect failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, self.config.max_delay_secs * 1000);
                }
            }
        }
    }

    /// Send one request and wait for its response.
    async fn roundtrip(&self, msg: ClientMessage) -> Result<ServerMessage, StorageError> {
        let mut transport = self.transport.lock().await;
        if !transport.is_connected() {
            self.connect_with_retry(&mut transport).await?;
        }

        let response =
            match tokio::time::timeout(self.config.request_timeout(), transport.request(msg)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    let _ = transport.disconnect().await;
                    return Err(e.into());
                }
                Err(_) => {
                    // A late reply would be read as the answer to the next request.
                    let _ = transport.disconnect().await;
                    return Err(StorageError::Timeout);
                }
            };

        match response {
            ServerMessage::Error { message } => Err(StorageError::Rejected(message)),
            response => Ok(response),
        }
    }
}

fn unexpected(response: &ServerMessage) -> StorageError {
    StorageError::Rejected(format!("unexpected response: {response:?}"))
}

fn decode_manifest(wire: &WireManifest) -> Result<Manifest, StorageError> {
    let failed = StorageError::ManifestDeserializationFailed {
        version: wire.version,
    };
    match Manifest::decode(&wire.value) {
        Ok(manifest) if manifest.version == wire.version => Ok(manifest),
        Ok(manifest) => {
            tracing::warn!(
                wire_version = wire.version,
                manifest_version = manifest.version,
                "manifest version mismatch"
            );
            Err(failed)
        }
        Err(e) => {
            tracing::warn!(error = %e, version = wire.version, "manifest failed to parse");
            Err(failed)
        }
    }
}

fn encode_manifest(manifest: &Manifest) -> Result<WireManifest, StorageError> {
    let value = manifest
        .encode()
        .map_err(|e| StorageError::Rejected(format!("failed to encode manifest: {e}")))?;
    Ok(WireManifest {
        version: manifest.version,
        value,
    })
}

fn encode_item(item: &StorageItem) -> Result<WireItem, StorageError> {
    let value = item
        .record
        .encode()
        .map_err(|e| StorageError::Rejected(format!("failed to encode record: {e}")))?;
    Ok(WireItem {
        key: item.identifier.key.clone(),
        value,
    })
}

impl<T: Transport> StorageService for RemoteStorageClient<T> {
    fn fetch_latest_manifest(&self, greater_than: Option<u64>) -> ServiceFuture<'_, ManifestFetch> {
        Box::pin(async move {
            let response = self
                .roundtrip(ClientMessage::fetch_manifest(greater_than))
                .await?;
            match response {
                ServerMessage::NoExistingManifest => Ok(ManifestFetch::NoExistingManifest),
                ServerMessage::NoNewerManifest => Ok(ManifestFetch::NoNewerManifest),
                ServerMessage::Manifest { manifest } => {
                    Ok(ManifestFetch::Latest(decode_manifest(&manifest)?))
                }
                other => Err(unexpected(&other)),
            }
        })
    }

    fn fetch_items(&self, identifiers: Vec<StorageIdentifier>) -> ServiceFuture<'_, Vec<StorageItem>> {
        Box::pin(async move {
            if identifiers.is_empty() {
                return Ok(Vec::new());
            }
            let by_key: BTreeMap<ByteKey, StorageIdentifier> = identifiers
                .into_iter()
                .map(|id| (id.key.clone(), id))
                .collect();
            let keys = by_key.keys().cloned().collect();

            let response = self.roundtrip(ClientMessage::fetch_items(keys)).await?;
            let ServerMessage::Items { items } = response else {
                return Err(unexpected(&response));
            };

            let mut decoded = Vec::with_capacity(items.len());
            for item in items {
                let Some(identifier) = by_key.get(&item.key) else {
                    tracing::warn!(key = %item.key, "ignoring unrequested item");
                    continue;
                };
                let record = Record::decode(identifier.record_type, &item.value).map_err(|e| {
                    tracing::warn!(error = %e, identifier = %identifier, "item failed to parse");
                    StorageError::ItemDeserializationFailed
                })?;
                decoded.push(StorageItem::new(identifier.clone(), record));
            }
            Ok(decoded)
        })
    }

    fn update_manifest(&self, update: ManifestUpdate) -> ServiceFuture<'_, Option<Manifest>> {
        Box::pin(async move {
            let manifest = encode_manifest(&update.manifest)?;
            let insert = update
                .new_items
                .iter()
                .map(encode_item)
                .collect::<Result<Vec<_>, _>>()?;
            let delete = update
                .deleted_identifiers
                .iter()
                .map(|id| id.key.clone())
                .collect();

            let msg = ClientMessage::update_manifest(
                manifest,
                insert,
                delete,
                update.delete_all_existing,
            );
            match self.roundtrip(msg).await? {
                ServerMessage::Accepted { version } if version == update.manifest.version => {
                    Ok(None)
                }
                ServerMessage::Conflict { manifest } => Ok(Some(decode_manifest(&manifest)?)),
                other => Err(unexpected(&other)),
            }
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
