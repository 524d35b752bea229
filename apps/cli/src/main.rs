//! bookforge CLI: multi-format book builds from markdown fragments.
//!
//! Assembles per-language markdown trees into one document and converts it
//! to print, e-reader, web, word-processor and device formats.

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
