//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use himawari::config::ConfigError;
use himawari::logging::LoggingError;
use himawari::AcquireError;

/// Errors surfaced to the user. Every variant exits with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or inconsistent settings.
    Config(String),
    /// Reading or writing the configuration file failed.
    ConfigFile(ConfigError),
    /// The tracing subscriber could not be installed.
    Logging(LoggingError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// An acquisition run failed.
    Acquire(AcquireError),
    /// Pointing the output link at a new image failed.
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Writing the PID file failed.
    PidFile {
        path: PathBuf,
        source: std::io::Error,
    },
    CacheStats(String),
    CacheClear(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Acquire(e) => write!(f, "{}", e),
            CliError::Output { path, source } => {
                write!(f, "Failed to update {}: {}", path.display(), source)
            }
            CliError::PidFile { path, source } => {
                write!(f, "Failed to write pid file {}: {}", path.display(), source)
            }
            CliError::CacheStats(msg) => write!(f, "Failed to read cache statistics: {}", msg),
            CliError::CacheClear(msg) => write!(f, "Failed to clear cache: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<AcquireError> for CliError {
    fn from(e: AcquireError) -> Self {
        CliError::Acquire(e)
    }
}
