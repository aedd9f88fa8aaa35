//! Shared setup for commands that talk to the archive.

use std::path::{Path, PathBuf};
use std::time::Duration;

use himawari::config::ConfigFile;
use himawari::executor::RetryPolicy;
use himawari::logging::{init_logging, LoggingConfig, LoggingGuard};
use himawari::ImageAcquirer;
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Flag values that take precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub cache_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub parallel: Option<usize>,
}

/// Loaded configuration, installed logging and a runtime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging = init_logging(LoggingConfig::default().with_file(config.logging.file.clone()))?;
        let runtime = Runtime::new().map_err(CliError::Runtime)?;
        Ok(Self {
            config,
            runtime,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = himawari::VERSION, command, "Himawari starting");
    }

    /// Cache directory after overrides.
    pub fn cache_dir(&self, overrides: &Overrides) -> PathBuf {
        overrides
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.config.cache.directory.clone())
    }

    /// Acquirer over the archive, configured from file and flags.
    pub fn acquirer(&self, overrides: &Overrides) -> Result<ImageAcquirer, CliError> {
        let mut acquire = self.config.acquire_config();
        if let Some(retries) = overrides.retries {
            let cooldown = Duration::from_millis(self.config.download.cooldown_ms);
            acquire = acquire.with_retry_policy(RetryPolicy::fixed(retries, cooldown));
        }
        if let Some(parallel) = overrides.parallel {
            acquire = acquire.with_http_parallel(parallel);
        }
        let timeout = overrides
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.http_timeout());

        let cache_dir = self.cache_dir(overrides);
        Ok(ImageAcquirer::himawari(
            &cache_dir,
            self.config.source.clone(),
            timeout,
            acquire,
        )?)
    }
}

/// Writes the current process id to `path`.
pub fn write_pid_file(path: &Path) -> Result<(), CliError> {
    std::fs::write(path, std::process::id().to_string()).map_err(|source| CliError::PidFile {
        path: path.to_path_buf(),
        source,
    })
}
