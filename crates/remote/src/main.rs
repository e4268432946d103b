// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! lc-remote: reference collection server for livecoll.
//!
//! Holds collections in memory and serves paginated reads, filtered change
//! feeds and writes over WebSocket.

mod server;
mod state;

use clap::Parser;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// lc-remote: Live collection server
#[derive(Parser, Debug)]
#[command(name = "lc-remote")]
#[command(about = "In-memory collection server for livecoll clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// JSON file of initial records: {"collection": [records...]}
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// Unsent changes a connection may fall behind by before it is closed
    #[arg(long, default_value_t = state::DEFAULT_BACKLOG)]
    backlog: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting lc-remote server");
    info!("  Bind address: {}", args.bind);

    let state = match &args.seed {
        Some(path) => {
            info!("  Seed file: {}", path.display());
            state::ServerState::load_seed(path, args.backlog)?
        }
        None => state::ServerState::with_backlog(HashMap::new(), args.backlog),
    };

    server::run(args.bind, state).await?;

    Ok(())
}
