// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    network = { StorageError::Network("reset".into()), true },
    timeout = { StorageError::Timeout, true },
    rejected = { StorageError::Rejected("bad".into()), false },
    manifest_decrypt = { StorageError::ManifestDecryptionFailed { version: 3 }, false },
    item_parse = { StorageError::ItemDeserializationFailed, false },
)]
fn storage_error_retryable(err: StorageError, expected: bool) {
    assert_eq!(err.is_retryable(), expected);
    assert_eq!(SyncError::from(err).is_retryable(), expected);
}

#[test]
fn failure_classes_are_disjoint() {
    let decrypt = StorageError::ItemDecryptionFailed;
    assert!(decrypt.is_decryption_failure());
    assert!(!decrypt.is_deserialization_failure());

    let parse = StorageError::ManifestDeserializationFailed { version: 1 };
    assert!(parse.is_deserialization_failure());
    assert!(!parse.is_decryption_failure());
}

#[test]
fn display_includes_details() {
    let err = SyncError::TooManyConflicts { conflicts: 4 };
    assert!(err.to_string().contains('4'));

    let err = SyncError::from(StorageError::ManifestDecryptionFailed { version: 12 });
    assert!(err.to_string().contains("v12"));
}

#[test]
fn core_errors_are_not_retryable() {
    let err = SyncError::from(ss_core::Error::InvalidInput("x".into()));
    assert!(!err.is_retryable());
}

#[test]
fn shared_errors_keep_their_class() {
    let shared = Arc::new(SyncError::from(StorageError::Timeout));
    let err = SyncError::Shared(shared);
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "request timed out");
}
