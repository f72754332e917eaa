//! WikiSync CLI — incremental wiki-to-document synchronization.
//!
//! Pulls pages and attachments from an XWiki-style wiki through its search
//! API, assembles normalized documents, and resumes from a persisted cursor.

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
