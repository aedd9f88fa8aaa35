//! Tracing subscriber setup.
//!
//! Logs go to stderr and, optionally, to a file. The filter honours
//! `RUST_LOG` and falls back to [`LoggingConfig::default_filter`].
//!
//! ```ignore
//! let _guard = himawari::logging::init_logging(LoggingConfig::default())?;
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "himawari=info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("cannot create log directory {}: {source}", .path.display())]
    Directory { path: PathBuf, source: io::Error },

    #[error("log file path {} has no file name", .0.display())]
    FileName(PathBuf),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directive used when `RUST_LOG` is unset, e.g. `himawari=debug`.
    pub default_filter: String,
    /// Append logs to this file as well as stderr.
    pub file: Option<PathBuf>,
    /// Colourise stderr output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            file: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }
}

/// Keeps the file writer alive. Buffered lines are flushed on drop.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn build_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter).map_err(|e| LoggingError::Filter {
        filter: default_filter.to_string(),
        reason: e.to_string(),
    })
}

/// Splits a log file path into its directory and file name, creating the
/// directory.
fn prepare_log_file(path: &Path) -> Result<(PathBuf, String), LoggingError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LoggingError::FileName(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::Directory {
        path: dir.clone(),
        source,
    })?;
    Ok((dir, name))
}

/// Installs the global subscriber. Hold the returned guard until exit.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.default_filter)?;
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer.clone())
        .with_ansi(config.ansi)
        .with_target(false);

    let (file_layer, guard) = match config.file {
        Some(ref path) => {
            let (dir, name) = prepare_log_file(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}
