// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each text frame carries one [`ClientMessage`] and gets exactly one
//! [`ServerMessage`] back, in order.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use ss_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{ManifestLookup, ManifestWrite, ServerState, UpdateOutcome};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accept connections from an already bound listener.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let response = match handle_client_message(&text, &state).await {
                    Ok(response) => response,
                    Err(e) => ServerMessage::error(e.to_string()),
                };
                ws_sink.send(Message::Text(response.to_json()?.into())).await?;
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                ws_sink.send(Message::Pong(data)).await?;
            }
            Ok(_) => {
                // Ignore other message types (Binary, Pong, Frame)
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process one client message and build its response.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
) -> Result<ServerMessage, BoxError> {
    let msg = ClientMessage::from_json(text)?;

    let response = match msg {
        ClientMessage::FetchManifest { greater_than } => {
            match state.fetch_manifest(greater_than).await? {
                ManifestLookup::NoExisting => ServerMessage::NoExistingManifest,
                ManifestLookup::NoNewer => ServerMessage::NoNewerManifest,
                ManifestLookup::Latest(manifest) => {
                    debug!(version = manifest.version, "Sending manifest");
                    ServerMessage::manifest(manifest)
                }
            }
        }

        ClientMessage::FetchItems { keys } => {
            let items = state.fetch_items(&keys).await?;
            debug!(requested = keys.len(), found = items.len(), "Sending items");
            ServerMessage::items(items)
        }

        ClientMessage::UpdateManifest {
            manifest,
            insert,
            delete,
            delete_all,
        } => {
            let write = ManifestWrite {
                manifest,
                insert,
                delete,
                delete_all,
            };
            match state.update_manifest(write).await? {
                UpdateOutcome::Accepted(version) => ServerMessage::accepted(version),
                UpdateOutcome::Conflict(current) => ServerMessage::conflict(current),
            }
        }

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            ServerMessage::pong(id)
        }
    };
    Ok(response)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
