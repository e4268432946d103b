// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The `lc` command line.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::merge::SnapshotView;
use crate::reconciler::{Backend, Reconciler, SyncOptions};

const QUICKSTART_HELP: &str = "\
Examples:
  lc watch notes                              Print every snapshot of notes
  lc watch tasks --filter \"done = false\"      Only open tasks
  lc watch tasks --sort title --once          Print the first snapshot and exit";

#[derive(Parser, Debug)]
#[command(name = "lc")]
#[command(about = "Watch live collections")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: <config dir>/livecoll/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the snapshot as a JSON line on every change
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WatchArgs {
    /// Collection name
    pub collection: String,

    /// Filter expression, e.g. "status = 'open' && priority > 2"
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// Sort fields, "-" prefix for descending
    #[arg(short, long)]
    pub sort: Option<String>,

    /// Records requested by the initial fetch
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Page to fetch (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Server URL (ws:// or wss://)
    #[arg(long)]
    pub url: Option<String>,

    /// Exit after the first loaded snapshot
    #[arg(long)]
    pub once: bool,
}

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Command::Watch(args) => watch(config, args).await,
    }
}

/// Applies command line overrides on top of file configuration.
pub fn apply_overrides(mut config: ClientConfig, args: &WatchArgs) -> Result<ClientConfig> {
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(sort) = &args.sort {
        config.sort = sort.clone();
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    config.validate()?;
    Ok(config)
}

async fn watch(config: ClientConfig, args: WatchArgs) -> Result<()> {
    let config = apply_overrides(config, &args)?;
    let reconciler = Reconciler::new(Backend::from_config(&config));
    let options = SyncOptions::new(args.collection.as_str())
        .filter(args.filter.as_str())
        .sort(config.sort.as_str())
        .page(args.page)
        .page_size(config.page_size);
    let mut handle = reconciler.start_with(options)?;
    info!(url = %config.url, collection = %args.collection, "watching");

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = handle.changed() => {
                if !changed {
                    break;
                }
                let view = handle.snapshot();
                if view.loading {
                    continue;
                }
                writeln!(stdout, "{}", render_view(&view))?;
                stdout.flush()?;
                if args.once {
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// One JSON line describing a snapshot.
pub fn render_view(view: &SnapshotView) -> Value {
    json!({
        "phase": view.phase.as_str(),
        "total_items": view.total_items,
        "page": view.page,
        "total_pages": view.total_pages,
        "error": view.error.as_ref().map(|e| e.to_string()),
        "records": view.records.as_slice(),
    })
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
