// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync engine.

use std::sync::Arc;

use thiserror::Error;

/// Failures reported by a storage service implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The request could not be delivered or the connection dropped.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The service answered with an error.
    #[error("rejected by storage service: {0}")]
    Rejected(String),

    #[error("failed to decrypt manifest v{version}")]
    ManifestDecryptionFailed { version: u64 },

    #[error("failed to parse manifest v{version}")]
    ManifestDeserializationFailed { version: u64 },

    #[error("failed to decrypt storage item")]
    ItemDecryptionFailed,

    #[error("failed to parse storage item")]
    ItemDeserializationFailed,
}

impl StorageError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Network(_) | StorageError::Timeout)
    }

    /// Failures that indicate the local sync key does not match the data.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            StorageError::ManifestDecryptionFailed { .. } | StorageError::ItemDecryptionFailed
        )
    }

    /// Failures that indicate corrupt remote bytes.
    pub fn is_deserialization_failure(&self) -> bool {
        matches!(
            self,
            StorageError::ManifestDeserializationFailed { .. }
                | StorageError::ItemDeserializationFailed
        )
    }
}

/// Errors surfaced by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("local store error: {0}")]
    Core(#[from] ss_core::Error),

    /// Gave up after too many conflicting writes in a row.
    #[error("too many consecutive conflicts ({conflicts})")]
    TooManyConflicts { conflicts: u32 },

    #[error("sync key unavailable, waiting for keys from the primary device")]
    KeyUnavailable,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sync manager shut down")]
    Shutdown,

    /// A failure shared by every caller waiting on the same request.
    #[error(transparent)]
    Shared(Arc<SyncError>),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Storage(e) => e.is_retryable(),
            SyncError::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
