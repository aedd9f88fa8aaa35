//! INI configuration file.
//!
//! ```ini
//! [download]
//! timeout = 30
//! attempt_timeout = 60
//! retries = 5
//! cooldown_ms = 1000
//! parallel = 32
//!
//! [cache]
//! directory = /tmp/himawari
//! purge_tiles = true
//!
//! [source]
//! latest_url = http://himawari8-dl.nict.go.jp/himawari8/img/D531106/latest.json
//! tile_url = http://himawari8.nict.go.jp/img/D531106/{level}d/{size}/{timestamp}_{x}_{y}.png
//! coastline_url = http://himawari8.nict.go.jp/img/D531106/coastline/ff0000/{level}d/{size}/{x}_{y}.png
//! tile_size = 550
//!
//! [logging]
//! file = /var/log/himawari.log
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::ConfigError;
use crate::coord::MAX_TILE_SIZE;
use crate::executor::{RetryPolicy, DEFAULT_COOLDOWN_MS, DEFAULT_MAX_ATTEMPTS};
use crate::pipeline::{
    default_cache_dir, AcquireConfig, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_HTTP_PARALLEL,
};
use crate::provider::{SourceConfig, DEFAULT_TIMEOUT_SECS};

/// Directory under the home directory holding the configuration.
pub const CONFIG_DIR_NAME: &str = ".himawari";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Per-attempt budget in seconds. 0 disables it.
    pub attempt_timeout_secs: u64,
    /// Maximum attempts per work unit, including the first.
    pub retries: u32,
    /// Pause between attempts in milliseconds.
    pub cooldown_ms: u64,
    /// Maximum concurrent HTTP requests. 0 means unlimited.
    pub parallel: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            retries: DEFAULT_MAX_ATTEMPTS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            parallel: DEFAULT_HTTP_PARALLEL,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Directory for composed images; tile entries live in its `tiles/`.
    pub directory: PathBuf,
    /// Delete per-tile entries once an image is persisted.
    pub purge_tiles: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            purge_tiles: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub cache: CacheSettings,
    pub source: SourceConfig,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// `~/.himawari/config.ini`, if the home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the default configuration file, or defaults if it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let d = &mut config.download;

        set(ini, "download", "timeout", &mut d.timeout_secs)?;
        set(ini, "download", "attempt_timeout", &mut d.attempt_timeout_secs)?;
        set(ini, "download", "retries", &mut d.retries)?;
        set(ini, "download", "cooldown_ms", &mut d.cooldown_ms)?;
        set(ini, "download", "parallel", &mut d.parallel)?;

        if let Some(dir) = get(ini, "cache", "directory") {
            config.cache.directory = PathBuf::from(dir);
        }
        set(ini, "cache", "purge_tiles", &mut config.cache.purge_tiles)?;

        let s = &mut config.source;
        if let Some(url) = get(ini, "source", "latest_url") {
            s.latest_url = url.to_string();
        }
        if let Some(url) = get(ini, "source", "tile_url") {
            s.tile_url = url.to_string();
        }
        if let Some(url) = get(ini, "source", "coastline_url") {
            s.coastline_url = url.to_string();
        }
        set(ini, "source", "tile_size", &mut s.tile_size)?;
        if s.tile_size == 0 || s.tile_size > MAX_TILE_SIZE {
            return Err(invalid("source", "tile_size", &s.tile_size.to_string()));
        }

        config.logging.file = get(ini, "logging", "file").map(PathBuf::from);

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("download"))
            .set("timeout", self.download.timeout_secs.to_string())
            .set("attempt_timeout", self.download.attempt_timeout_secs.to_string())
            .set("retries", self.download.retries.to_string())
            .set("cooldown_ms", self.download.cooldown_ms.to_string())
            .set("parallel", self.download.parallel.to_string());
        ini.with_section(Some("cache"))
            .set("directory", self.cache.directory.to_string_lossy())
            .set("purge_tiles", self.cache.purge_tiles.to_string());
        ini.with_section(Some("source"))
            .set("latest_url", self.source.latest_url.as_str())
            .set("tile_url", self.source.tile_url.as_str())
            .set("coastline_url", self.source.coastline_url.as_str())
            .set("tile_size", self.source.tile_size.to_string());
        if let Some(ref file) = self.logging.file {
            ini.with_section(Some("logging"))
                .set("file", file.to_string_lossy());
        }
        ini
    }

    /// Configuration in file form.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        match self.to_ini().write_to(&mut out) {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => String::new(),
        }
    }

    /// Writes the configuration to `path`, creating its directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)
    }

    /// HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_secs)
    }

    /// Acquisition settings derived from this file.
    pub fn acquire_config(&self) -> AcquireConfig {
        let attempt_timeout = match self.download.attempt_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        AcquireConfig::default()
            .with_output_dir(&self.cache.directory)
            .with_retry_policy(RetryPolicy::fixed(
                self.download.retries,
                Duration::from_millis(self.download.cooldown_ms),
            ))
            .with_attempt_timeout(attempt_timeout)
            .with_http_parallel(self.download.parallel)
            .with_purge_tiles(self.cache.purge_tiles)
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn set<T: FromStr>(ini: &Ini, section: &str, key: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Some(raw) = get(ini, section, key) {
        *slot = raw.parse().map_err(|_| invalid(section, key, raw))?;
    }
    Ok(())
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}
