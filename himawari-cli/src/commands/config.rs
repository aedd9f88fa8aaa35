//! Configuration inspection commands.

use clap::Subcommand;
use himawari::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = ConfigFile::load()?;
            print!("{}", config.render());
            Ok(())
        }
        ConfigCommands::Path => {
            let path = ConfigFile::default_path()
                .ok_or_else(|| CliError::Config("Cannot determine home directory".to_string()))?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
