// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ss-remote: reference storage service server.
//!
//! Stores one manifest and a set of opaque items per data directory and
//! serves them to `ssync` clients over WebSocket. A manifest write is only
//! accepted when it proposes the next version.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// ss-remote: Storage service server
#[derive(Parser, Debug)]
#[command(name = "ss-remote")]
#[command(about = "WebSocket storage service for ssync clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7891")]
    bind: SocketAddr,

    /// Directory for the storage database
    #[arg(short, long, default_value = ".")]
    data: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting ss-remote server");
    info!("  Bind address: {}", args.bind);
    info!("  Data directory: {}", args.data.display());

    let state = state::ServerState::new(&args.data)?;
    server::run(args.bind, state).await
}
