// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Stored as TOML, by default at `<config dir>/ssync/config.toml`. Every
//! key is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};

const APP_DIR_NAME: &str = "ssync";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "local.db";

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Storage service WebSocket URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Attempts per operation (and per reconnect) before giving up on
    /// transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial delay for exponential backoff (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (seconds).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Delay between the first recorded mutation and the backup it triggers.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_consecutive_conflicts")]
    pub max_consecutive_conflicts: u32,
    #[serde(default = "default_item_batch_size")]
    pub item_batch_size: usize,
    #[serde(default = "default_constrained_item_batch_size")]
    pub constrained_item_batch_size: usize,
    /// Use the smaller item batch size.
    #[serde(default)]
    pub memory_constrained: bool,
    /// Whether call link records are synced. When false they are kept as
    /// unknown identifiers.
    #[serde(default = "default_call_link_sync")]
    pub call_link_sync: bool,
    /// How long locally deleted call links are kept before being purged.
    #[serde(default = "default_call_link_deletion_delay_secs")]
    pub call_link_deletion_delay_secs: u64,
    /// Per-request timeout for the WebSocket client.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "ws://localhost:7891".to_string()
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_max_consecutive_conflicts() -> u32 {
    3
}

fn default_item_batch_size() -> usize {
    1024
}

fn default_constrained_item_batch_size() -> usize {
    256
}

fn default_call_link_sync() -> bool {
    true
}

fn default_call_link_deletion_delay_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: default_url(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            debounce_ms: default_debounce_ms(),
            max_consecutive_conflicts: default_max_consecutive_conflicts(),
            item_batch_size: default_item_batch_size(),
            constrained_item_batch_size: default_constrained_item_batch_size(),
            memory_constrained: false,
            call_link_sync: default_call_link_sync(),
            call_link_deletion_delay_secs: default_call_link_deletion_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Loads configuration from a TOML file, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("failed to parse config: {}", e)))
    }

    /// Saves configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Number of items fetched per merge batch.
    pub fn batch_size(&self) -> usize {
        let size = if self.memory_constrained {
            self.constrained_item_batch_size
        } else {
            self.item_batch_size
        };
        size.max(1)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn call_link_deletion_delay(&self) -> Duration {
        Duration::from_secs(self.call_link_deletion_delay_secs)
    }

    /// Backoff before attempt number `attempt` (1-based) is retried.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_secs.saturating_mul(1000));
        Duration::from_millis(delay_ms)
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Default local database location.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME).join(DB_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
