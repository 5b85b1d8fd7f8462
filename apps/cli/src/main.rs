//! ClearMind CLI: calm, structured rewrites of overwhelming text.
//!
//! Simplifies, segments, extracts, and decomposes text through a language
//! model, and keeps the model API key in a local store.

mod commands;
mod render;

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
