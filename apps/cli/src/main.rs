//! AssetForge CLI: consolidate agent work products into a versioned asset catalog.
//!
//! Imports workspace snapshots into a local database and prints the unified
//! asset catalog the consolidation engine builds from them.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
