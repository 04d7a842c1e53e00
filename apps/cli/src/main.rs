//! llmstxt CLI: site maps for AI assistants, and a benchmark that checks they help.
//!
//! Crawls a website into a structured, link-preserving document and measures
//! whether that document improves assistant answers.

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
