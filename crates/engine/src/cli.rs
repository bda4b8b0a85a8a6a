// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "ssync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sync a device's social graph with the storage service")]
pub struct Cli {
    /// Local database (defaults to the user data directory)
    #[arg(long, global = true, value_name = "path")]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the local account on this device
    Init {
        /// Account identifier
        #[arg(long, value_parser = non_empty_string)]
        aci: String,

        /// Phone number identity
        #[arg(long)]
        pni: Option<String>,

        /// Phone number
        #[arg(long)]
        e164: Option<String>,

        /// Register as a linked device with this device id
        #[arg(long, value_name = "device-id")]
        linked: Option<u32>,
    },

    /// Show sync state
    Status,

    /// Fetch the latest manifest, or create one
    Restore,

    /// Upload pending local changes
    Backup,

    /// Clean up unknown data and expired call links, then back up
    Cleanup,

    /// Forget all sync state
    Reset,

    /// Manage contacts
    Contact {
        #[command(subcommand)]
        command: ContactCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContactCommand {
    /// Add a contact and mark it for upload
    Add {
        #[arg(long, value_parser = non_empty_string)]
        aci: String,

        #[arg(long)]
        given_name: Option<String>,

        #[arg(long)]
        family_name: Option<String>,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
