//! Init command - write a default configuration file.

use himawari::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is kept unless `force` is set.
pub fn run(force: bool) -> Result<(), CliError> {
    let path = ConfigFile::default_path()
        .ok_or_else(|| CliError::Config("Cannot determine home directory".to_string()))?;

    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save(&path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize Himawari settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
