//! Cache management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use himawari::cache::DiskCache;
use himawari::config::ConfigFile;
use himawari::pipeline::TILE_CACHE_SUBDIR;

use super::common::format_size;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove all cached tiles
    Clear,
    /// Show tile cache statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, cache_dir: Option<PathBuf>) -> Result<(), CliError> {
    let cache_dir = match cache_dir {
        Some(dir) => dir,
        None => ConfigFile::load()?.cache.directory,
    };
    let cache = DiskCache::new(cache_dir.join(TILE_CACHE_SUBDIR));

    match action {
        CacheAction::Clear => {
            println!("Clearing tile cache at: {}", cache.directory().display());
            let removed = cache
                .clear()
                .map_err(|e| CliError::CacheClear(e.to_string()))?;
            println!(
                "Deleted {} tiles, freed {}",
                removed.entries,
                format_size(removed.bytes)
            );
            Ok(())
        }
        CacheAction::Stats => {
            println!("Tile cache: {}", cache.directory().display());
            let stats = cache
                .stats()
                .map_err(|e| CliError::CacheStats(e.to_string()))?;
            println!("  Tiles: {}", stats.entries);
            println!("  Size:  {}", format_size(stats.bytes));
            Ok(())
        }
    }
}
