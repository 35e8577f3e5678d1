use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Book aggregates, fill them from worker threads, export the merged results",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Book every aggregate in a config, fill it with synthetic events and export
    Run(RunArgs),
    /// Validate a config and list the entries it books
    Check(CheckArgs),
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Bincode,
}

#[derive(Args)]
pub struct RunArgs {
    /// TOML file listing the aggregates to book.
    pub config: PathBuf,
    /// Directory the store_on_exit entries are written to.
    #[arg(short, long, default_value = "tally-out")]
    pub out: PathBuf,
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,
    /// Worker threads filling the aggregates.
    #[arg(short, long, default_value = "4")]
    pub workers: usize,
    /// Events generated per worker.
    #[arg(short, long, default_value = "10000")]
    pub events: usize,
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Args)]
pub struct CheckArgs {
    pub config: PathBuf,
}
