//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use clap::Args;
use himawari::coord::Level;
use himawari::pipeline::parse_color;
use himawari::pipeline::Rgba;

use crate::error::CliError;
use crate::runner::Overrides;

/// Download settings that override the configuration file.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Cache and output directory
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per tile, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Maximum concurrent HTTP requests, 0 for unlimited
    #[arg(long)]
    pub parallel: Option<usize>,
}

impl From<DownloadArgs> for Overrides {
    fn from(args: DownloadArgs) -> Self {
        Overrides {
            cache_dir: args.cache,
            timeout: args.timeout,
            retries: args.retries,
            parallel: args.parallel,
        }
    }
}

/// Parse a `--level` value; only 4, 8, 16 and 20 are accepted.
pub fn parse_level(s: &str) -> Result<Level, String> {
    let n: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    Level::try_from(n).map_err(|e| e.to_string())
}

/// Parse a `--color` value given as `rrggbbaa`.
pub fn parse_rgba(s: &str) -> Result<Rgba<u8>, String> {
    parse_color(s).map_err(|e| e.to_string())
}

/// Default location of the `--output` link.
pub fn default_output() -> PathBuf {
    std::env::temp_dir().join("himawari.png")
}

/// Points `link` at `target`, replacing whatever was there.
///
/// The new link is created beside `link` and renamed over it, so readers
/// never observe a missing file. Relative targets are resolved against the
/// current directory, not the link's directory.
#[cfg(unix)]
pub fn swap_link(target: &Path, link: &Path) -> Result<(), CliError> {
    let output_error = |source| CliError::Output {
        path: link.to_path_buf(),
        source,
    };
    let target = std::fs::canonicalize(target).map_err(output_error)?;
    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "himawari".to_string());
    let staging = link.with_file_name(format!(".{}.{}.link", name, std::process::id()));

    let _ = std::fs::remove_file(&staging);
    std::os::unix::fs::symlink(&target, &staging).map_err(output_error)?;
    std::fs::rename(&staging, link).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        output_error(e)
    })
}

/// Copies `target` to `link`; symbolic links need extra privileges here.
#[cfg(not(unix))]
pub fn swap_link(target: &Path, link: &Path) -> Result<(), CliError> {
    std::fs::copy(target, link)
        .map(|_| ())
        .map_err(|source| CliError::Output {
            path: link.to_path_buf(),
            source,
        })
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
