// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the transport module.

#![allow(clippy::unwrap_used)]

use super::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared view of a [`MockTransport`] that stays usable after the
/// transport is moved into a client.
#[derive(Clone, Default)]
pub struct MockHandle {
    /// Messages that will be returned by recv().
    incoming: Arc<Mutex<VecDeque<ServerMessage>>>,
    /// Messages that were sent via send().
    outgoing: Arc<Mutex<Vec<ClientMessage>>>,
    /// Number of upcoming connect calls that fail.
    connect_failures: Arc<Mutex<u32>>,
    connect_attempts: Arc<Mutex<u32>>,
}

impl MockHandle {
    /// Add a message that will be returned by recv().
    pub fn queue_incoming(&self, msg: ServerMessage) {
        self.incoming.lock().unwrap().push_back(msg);
    }

    /// Get all messages that were sent.
    pub fn outgoing(&self) -> Vec<ClientMessage> {
        self.outgoing.lock().unwrap().clone()
    }

    pub fn fail_next_connects(&self, count: u32) {
        *self.connect_failures.lock().unwrap() = count;
    }

    pub fn connect_attempts(&self) -> u32 {
        *self.connect_attempts.lock().unwrap()
    }
}

/// Mock transport for testing without real sockets.
pub struct MockTransport {
    connected: bool,
    handle: MockHandle,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            connected: false,
            handle: MockHandle::default(),
        }
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            *self.handle.connect_attempts.lock().unwrap() += 1;
            let mut failures = self.handle.connect_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            drop(failures);
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        let outgoing = Arc::clone(&self.handle.outgoing);
        let connected = self.connected;
        Box::pin(async move {
            if !connected {
                return Err(TransportError::ConnectionClosed);
            }
            outgoing.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        let incoming = Arc::clone(&self.handle.incoming);
        Box::pin(async move {
            let msg = incoming.lock().unwrap().pop_front();
            Ok(msg)
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[tokio::test]
async fn mock_transport_connect() {
    let mut transport = MockTransport::new();
    assert!(!transport.is_connected());

    transport.connect("ws://localhost:1234").await.unwrap();
    assert!(transport.is_connected());

    transport.disconnect().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn request_pairs_send_with_recv() {
    let mut transport = MockTransport::new();
    let handle = transport.handle();
    transport.connect("ws://localhost:1234").await.unwrap();

    handle.queue_incoming(ServerMessage::pong(42));
    let response = transport.request(ClientMessage::ping(42)).await.unwrap();

    assert_eq!(response, ServerMessage::pong(42));
    assert_eq!(handle.outgoing(), vec![ClientMessage::ping(42)]);
}

#[tokio::test]
async fn request_without_reply_is_connection_closed() {
    let mut transport = MockTransport::new();
    transport.connect("ws://localhost:1234").await.unwrap();

    let err = transport.request(ClientMessage::ping(1)).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionClosed));
}

#[tokio::test]
async fn send_when_disconnected_fails() {
    let mut transport = MockTransport::new();
    let err = transport.send(ClientMessage::ping(1)).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionClosed));
}

#[tokio::test]
async fn websocket_transport_starts_disconnected() {
    let mut transport = WebSocketTransport::new();
    assert!(!transport.is_connected());
    let err = transport.send(ClientMessage::ping(1)).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionClosed));
}

#[test]
fn transport_errors_map_to_network() {
    let err: StorageError = TransportError::ConnectionClosed.into();
    assert!(err.is_retryable());
}
