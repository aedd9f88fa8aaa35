//! User configuration stored at `~/.himawari/config.ini`.

mod file;

pub use file::{
    CacheSettings, ConfigFile, DownloadSettings, LoggingSettings, CONFIG_DIR_NAME,
    CONFIG_FILE_NAME,
};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("cannot parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value {value:?} for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}
