//! mdigest CLI: turn a list of news URLs into a Markdown digest and a PDF
//! with a (optionally highlighted) table of contents.

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
