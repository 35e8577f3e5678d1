use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
    commands::run_command(cli)
}
