// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ss-core operations.

use thiserror::Error;

/// All possible errors that can occur in ss-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("invalid record type: {0}")]
    InvalidRecordType(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for ss-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
