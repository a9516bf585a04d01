//! wikidex CLI: normalize wiki markup and search the resulting corpus.
//!
//! Ingests JSON-lines page dumps into a local libSQL database and exposes
//! ranked search, document lookup and category browsing over it.

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
