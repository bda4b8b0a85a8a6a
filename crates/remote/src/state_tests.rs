// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

fn key(byte: u8) -> ByteKey {
    ByteKey::new(vec![byte; 16])
}

fn item(byte: u8) -> WireItem {
    WireItem {
        key: key(byte),
        value: vec![byte, byte],
    }
}

fn write(version: u64, insert: Vec<WireItem>, delete: Vec<ByteKey>) -> ManifestWrite {
    ManifestWrite {
        manifest: WireManifest {
            version,
            value: format!("manifest-{version}").into_bytes(),
        },
        insert,
        delete,
        delete_all: false,
    }
}

#[tokio::test]
async fn empty_store_has_no_manifest() {
    let state = ServerState::in_memory().unwrap();
    assert_eq!(
        state.fetch_manifest(None).await.unwrap(),
        ManifestLookup::NoExisting
    );
    assert_eq!(
        state.fetch_manifest(Some(3)).await.unwrap(),
        ManifestLookup::NoExisting
    );
}

#[tokio::test]
async fn first_write_accepts_any_version() {
    let state = ServerState::in_memory().unwrap();
    let outcome = state
        .update_manifest(write(5, vec![item(1)], vec![]))
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Accepted(5));

    match state.fetch_manifest(None).await.unwrap() {
        ManifestLookup::Latest(manifest) => assert_eq!(manifest.version, 5),
        other => unreachable!("unexpected lookup {other:?}"),
    }
    assert_eq!(
        state.fetch_manifest(Some(5)).await.unwrap(),
        ManifestLookup::NoNewer
    );
    assert!(matches!(
        state.fetch_manifest(Some(4)).await.unwrap(),
        ManifestLookup::Latest(_)
    ));
}

#[tokio::test]
async fn only_next_version_is_accepted() {
    let state = ServerState::in_memory().unwrap();
    state
        .update_manifest(write(1, vec![item(1)], vec![]))
        .await
        .unwrap();

    for version in [1, 3] {
        let outcome = state
            .update_manifest(write(version, vec![item(9)], vec![key(1)]))
            .await
            .unwrap();
        let UpdateOutcome::Conflict(current) = outcome else {
            unreachable!("version {version} should conflict");
        };
        assert_eq!(current.version, 1);
        assert_eq!(current.value, b"manifest-1".to_vec());
    }
    // Rejected writes leave items alone.
    assert_eq!(state.item_count().await.unwrap(), 1);

    let outcome = state
        .update_manifest(write(2, vec![item(2)], vec![key(1)]))
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Accepted(2));
    let items = state.fetch_items(&[key(1), key(2)]).await.unwrap();
    assert_eq!(items, vec![item(2)]);
}

#[tokio::test]
async fn delete_all_replaces_everything() {
    let state = ServerState::in_memory().unwrap();
    state
        .update_manifest(write(1, vec![item(1), item(2)], vec![]))
        .await
        .unwrap();

    let mut replace = write(2, vec![item(3)], vec![]);
    replace.delete_all = true;
    state.update_manifest(replace).await.unwrap();

    assert_eq!(state.item_count().await.unwrap(), 1);
    assert_eq!(
        state.fetch_items(&[key(1), key(3)]).await.unwrap(),
        vec![item(3)]
    );
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let state = ServerState::new(dir.path()).unwrap();
        state
            .update_manifest(write(1, vec![item(1)], vec![]))
            .await
            .unwrap();
    }

    let state = ServerState::new(dir.path()).unwrap();
    assert!(matches!(
        state.fetch_manifest(None).await.unwrap(),
        ManifestLookup::Latest(WireManifest { version: 1, .. })
    ));
    assert_eq!(state.fetch_items(&[key(1)]).await.unwrap(), vec![item(1)]);
}
