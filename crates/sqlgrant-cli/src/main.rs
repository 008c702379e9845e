mod cli;
mod commands;
mod output;

use anyhow::Result;
use cli::{Cli, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Read { kind, id } => commands::read(&cli.connection, &kind, &id, cli.output).await,
        Command::Apply { manifest } => commands::apply(&cli.connection, &manifest, cli.output).await,
        Command::Delete { kind, id, yes } => commands::delete(&cli.connection, &kind, &id, yes).await,
        Command::Lookup { target } => commands::lookup(&cli.connection, target, cli.output).await,
        Command::Kinds => {
            commands::kinds();
            Ok(())
        }
    }
}
