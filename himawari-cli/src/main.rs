//! Himawari CLI - Command-line interface
//!
//! Fetches the latest full-disc Himawari-8 image, optionally with coastlines,
//! and keeps a link pointing at it.

mod commands;
mod error;
mod progress;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::common::DownloadArgs;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "himawari", version, about = "Latest Himawari-8 full-disc imagery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the latest image and point the output link at it
    Fetch(FetchArgs),

    /// Print the timestamp of the latest published image
    Latest {
        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Inspect or clear the tile cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache directory [default: from config]
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args),
        Commands::Latest { download } => commands::latest::run(download.into()),
        Commands::Cache { action, cache } => commands::cache::run(action, cache),
        Commands::Config { command } => commands::config::run(command),
        Commands::Init { force } => commands::init::run(force),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
